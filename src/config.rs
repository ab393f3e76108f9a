use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::console::SharedLogger;

/// Project configuration looked up in the working directory when
/// `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "antwar.toml";

pub const SITE_BOILERPLATE: &str = "antwar-boilerplate";
pub const PLUGIN_BOILERPLATE: &str = "antwar-plugin-boilerplate";

/// The effective configuration every operation receives.
///
/// Keys use the camelCase names accepted in `antwar.toml` and in
/// `--config key=value` strings. Keys this struct does not know about are
/// kept in [`Config::extra`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
	/// Bundler configuration handed to asset-aware themes.
	pub webpack_config: PathBuf,
	/// Section of `content` rendered as the blog.
	pub blog_root: String,
	#[serde(deserialize_with = "integer_or_decimal_string")]
	pub port: u16,
	pub output: PathBuf,
	pub content: PathBuf,
	pub title: String,
	pub boilerplate: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub theme: Option<String>,
	pub themes: PathBuf,
	pub deploy: DeployConfig,
	pub paths: BTreeMap<String, SectionConfig>,
	#[serde(flatten)]
	pub extra: BTreeMap<String, Value>,
	#[serde(skip)]
	pub console: SharedLogger,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
	pub branch: String,
	pub remote: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionConfig {
	#[serde(skip_serializing_if = "Option::is_none")]
	pub title: Option<String>,
}

impl Default for Config {
	fn default() -> Self {
		Self {
			webpack_config: PathBuf::from("./webpack.config.js"),
			blog_root: "blog".to_string(),
			port: 3000,
			output: PathBuf::from("build"),
			content: PathBuf::from("content"),
			title: "Antwar".to_string(),
			boilerplate: SITE_BOILERPLATE.to_string(),
			theme: None,
			themes: PathBuf::from("themes"),
			deploy: DeployConfig::default(),
			paths: BTreeMap::new(),
			extra: BTreeMap::new(),
			console: SharedLogger::default(),
		}
	}
}

impl Default for DeployConfig {
	fn default() -> Self {
		Self {
			branch: "gh-pages".to_string(),
			remote: "origin".to_string(),
		}
	}
}

impl Config {
	/// Overlay `overrides` onto this config and lift the result back into a
	/// typed config. The logger is carried over unchanged.
	pub fn merged_with(&self, overrides: Value) -> Result<Config, ConfigError> {
		let mut base = serde_json::to_value(self).map_err(ConfigError::Invalid)?;
		merge(&mut base, overrides);

		let mut config: Config = serde_json::from_value(base).map_err(ConfigError::Invalid)?;
		config.console = self.console.clone();
		Ok(config)
	}
}

fn integer_or_decimal_string<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum Port {
		Number(u64),
		Text(String),
	}

	match Port::deserialize(deserializer)? {
		Port::Number(n) => u16::try_from(n).map_err(serde::de::Error::custom),
		Port::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
	}
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read {}: {source}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse {}: {source}", path.display())]
	Toml {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("failed to parse {}: {source}", path.display())]
	Json {
		path: PathBuf,
		#[source]
		source: serde_json::Error,
	},
	#[error("{} does not contain a table of settings", path.display())]
	NotATable { path: PathBuf },
	#[error("invalid configuration: {0}")]
	Invalid(#[source] serde_json::Error),
}

/// Where overrides for the default configuration come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideSource {
	/// Flat `key=value&key2=value2` settings given on the command line.
	Inline(String),
	/// Configuration file, relative to the working directory.
	File(PathBuf),
}

impl OverrideSource {
	/// Anything containing `=` is a query string, everything else a path.
	pub fn classify(value: &str) -> Self {
		if value.contains('=') {
			Self::Inline(value.to_string())
		} else {
			Self::File(PathBuf::from(value))
		}
	}

	/// Source for a `--config` flag value, falling back to
	/// [`DEFAULT_CONFIG_FILE`] when the flag is absent.
	pub fn from_flag(flag: Option<&str>) -> Self {
		match flag {
			Some(value) => Self::classify(value),
			None => Self::File(PathBuf::from(DEFAULT_CONFIG_FILE)),
		}
	}

	/// The file settings are written back to. Inline settings have none.
	pub fn file(&self, cwd: &Path) -> Option<PathBuf> {
		match self {
			Self::Inline(_) => None,
			Self::File(path) => Some(cwd.join(path)),
		}
	}

	fn load(&self, cwd: &Path) -> Result<Value, ConfigError> {
		match self {
			Self::Inline(query) => Ok(Value::Object(parse_query(query))),
			Self::File(path) => load_file(&cwd.join(path)),
		}
	}
}

/// Merge the override onto `defaults`.
///
/// Never fails: a source that cannot be loaded, or whose settings do not
/// fit, is reported once on the error channel and `defaults` is returned.
pub fn resolve(defaults: Config, source: Option<&OverrideSource>, cwd: &Path) -> Config {
	let Some(source) = source else {
		return defaults;
	};

	match source.load(cwd).and_then(|overrides| defaults.merged_with(overrides)) {
		Ok(config) => {
			tracing::debug!(?source, "configuration resolved");
			config
		}
		Err(e) => {
			defaults
				.console
				.error(&format!("Failed to load configuration: {}", e));
			defaults
		}
	}
}

fn load_file(path: &Path) -> Result<Value, ConfigError> {
	let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
		path: path.to_path_buf(),
		source,
	})?;

	let value = if path.extension().and_then(|s| s.to_str()) == Some("json") {
		serde_json::from_str::<Value>(&text).map_err(|source| ConfigError::Json {
			path: path.to_path_buf(),
			source,
		})?
	} else {
		let table = toml::from_str::<toml::Table>(&text).map_err(|source| ConfigError::Toml {
			path: path.to_path_buf(),
			source,
		})?;
		serde_json::to_value(table).map_err(ConfigError::Invalid)?
	};

	if value.is_object() {
		Ok(value)
	} else {
		Err(ConfigError::NotATable {
			path: path.to_path_buf(),
		})
	}
}

/// Parse `key=value&key2=value2` into flat string settings.
///
/// Nested keys are not supported: `deploy.branch=main` yields a top-level
/// key literally named `deploy.branch`. A repeated key keeps its last value.
pub fn parse_query(query: &str) -> Map<String, Value> {
	url::form_urlencoded::parse(query.as_bytes())
		.filter(|(key, _)| !key.is_empty())
		.map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
		.collect()
}

/// Deep merge: objects merge key by key, any other override value replaces
/// what was there.
pub fn merge(base: &mut Value, overrides: Value) {
	match (base, overrides) {
		(Value::Object(base), Value::Object(overrides)) => {
			for (key, value) in overrides {
				match base.get_mut(&key) {
					Some(existing) => merge(existing, value),
					None => {
						base.insert(key, value);
					}
				}
			}
		}
		(base, overrides) => *base = overrides,
	}
}
