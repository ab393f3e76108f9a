use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::generator::copy_dir;

/// Copy the theme at `source` into the project's themes directory and make
/// it the active theme in `project_file`. Returns the installed theme name.
pub fn install(source: &Path, config: &Config, project_file: &Path) -> Result<String> {
	if !source.is_dir() {
		bail!("Theme not found: {}", source.display());
	}
	let name = source
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.ok_or_else(|| anyhow!("Cannot derive a theme name from {}", source.display()))?;

	let target = config.themes.join(&name);
	if target.exists() {
		fs::remove_dir_all(&target)
			.with_context(|| format!("Failed to replace {}", target.display()))?;
	}
	copy_dir(source, &target)?;

	if !target.join("base.html").is_file() {
		config
			.console
			.warn(&format!("Theme `{}` has no base.html, the built-in template stays in use", name));
	}

	attach(&name, project_file)?;
	Ok(name)
}

/// Record `theme = "<name>"` in the project configuration, keeping
/// everything else in the file. `.json` files stay JSON, anything else is
/// written as TOML.
fn attach(name: &str, project_file: &Path) -> Result<()> {
	let existing = if project_file.exists() {
		Some(fs::read_to_string(project_file)?)
	} else {
		None
	};
	let parse_error = || format!("Failed to parse {}", project_file.display());

	let text = if project_file.extension().and_then(|s| s.to_str()) == Some("json") {
		let mut object = match existing {
			Some(text) => serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&text)
				.with_context(parse_error)?,
			None => serde_json::Map::new(),
		};
		object.insert("theme".to_string(), serde_json::Value::String(name.to_string()));
		serde_json::to_string_pretty(&object)? + "\n"
	} else {
		let mut table = match existing {
			Some(text) => toml::from_str::<toml::Table>(&text).with_context(parse_error)?,
			None => toml::Table::new(),
		};
		table.insert("theme".to_string(), toml::Value::String(name.to_string()));
		toml::to_string(&table)?
	};

	fs::write(project_file, text)
		.with_context(|| format!("Failed to write {}", project_file.display()))?;
	Ok(())
}

/// Names of the themes installed in the project, sorted.
pub fn installed(config: &Config) -> Result<Vec<String>> {
	if !config.themes.is_dir() {
		return Ok(Vec::new());
	}

	let mut names = Vec::new();
	for entry in fs::read_dir(&config.themes)? {
		let entry = entry?;
		if entry.file_type()?.is_dir() {
			names.push(entry.file_name().to_string_lossy().to_string());
		}
	}
	names.sort();
	Ok(names)
}
