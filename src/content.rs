use anyhow::{Context, Result};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::paths::Item;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
	pub frontmatter: Frontmatter,
	pub html_content: String,
	pub relative_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Frontmatter {
	pub title: Option<String>,
	pub section: Option<String>,
	pub date: Option<String>,
	pub description: Option<String>,
	pub order: Option<u32>,
	#[serde(default)]
	pub draft: bool,
	#[serde(flatten)]
	pub extra: HashMap<String, serde_yaml::Value>,
}

impl Document {
	pub fn parse(path: &Path, base_path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("Failed to read file: {}", path.display()))?;

		let (frontmatter, markdown) = extract_frontmatter(&content);
		let html_content = markdown_to_html(&rewrite_wiki_links(&markdown));
		let relative_path = path.strip_prefix(base_path).unwrap_or(path).to_path_buf();

		Ok(Self {
			frontmatter,
			html_content,
			relative_path,
		})
	}

	/// Slash-separated path without extension, e.g. `blog/hello`.
	pub fn item_path(&self) -> String {
		self.relative_path
			.with_extension("")
			.components()
			.map(|c| c.as_os_str().to_string_lossy().to_string())
			.collect::<Vec<_>>()
			.join("/")
	}

	/// The document's directory-derived section, unless frontmatter names one.
	pub fn section(&self) -> Option<String> {
		if let Some(section) = &self.frontmatter.section {
			return Some(section.clone());
		}
		let mut components = self.relative_path.components();
		let first = components.next()?;
		components
			.next()
			.map(|_| first.as_os_str().to_string_lossy().to_string())
	}

	pub fn to_item(&self) -> Item {
		Item {
			path: self.item_path(),
			section: self.section(),
			title: self.frontmatter.title.clone(),
			date: self.frontmatter.date.clone(),
		}
	}
}

fn extract_frontmatter(content: &str) -> (Frontmatter, String) {
	// YAML
	if let Some(rest) = content.strip_prefix("---\n") {
		if let Some(end) = rest.find("\n---\n") {
			let frontmatter = serde_yaml::from_str(&rest[..end]).unwrap_or_default();
			return (frontmatter, rest[end + 5..].to_string());
		}
	}

	// TOML
	if let Some(rest) = content.strip_prefix("+++\n") {
		if let Some(end) = rest.find("\n+++\n") {
			if let Ok(frontmatter) = toml::from_str::<Frontmatter>(&rest[..end]) {
				return (frontmatter, rest[end + 5..].to_string());
			}
		}
	}

	// JSON
	if let Some(rest) = content.strip_prefix("```json\n") {
		if let Some(end) = rest.find("\n```\n") {
			if let Ok(frontmatter) = serde_json::from_str::<Frontmatter>(&rest[..end]) {
				return (frontmatter, rest[end + 5..].to_string());
			}
		}
	}

	(Frontmatter::default(), content.to_string())
}

fn wiki_link_regex() -> &'static Regex {
	static WIKI_LINK: OnceLock<Regex> = OnceLock::new();
	WIKI_LINK.get_or_init(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("valid wiki link pattern"))
}

/// `[[Page Name]]` becomes `[Page Name](/page-name/)`.
fn rewrite_wiki_links(content: &str) -> String {
	wiki_link_regex()
		.replace_all(content, |caps: &Captures| {
			let page_name = &caps[1];
			let slug = page_name.trim().to_lowercase().replace(' ', "-");
			format!("[{}](/{}/)", page_name, slug)
		})
		.to_string()
}

fn markdown_to_html(markdown: &str) -> String {
	use pulldown_cmark::{html, Options, Parser};

	let mut options = Options::empty();
	options.insert(Options::ENABLE_STRIKETHROUGH);
	options.insert(Options::ENABLE_TABLES);
	options.insert(Options::ENABLE_TASKLISTS);
	options.insert(Options::ENABLE_SMART_PUNCTUATION);

	let parser = Parser::new_ext(markdown, options);
	let mut html_output = String::new();
	html::push_html(&mut html_output, parser);

	html_output
}
