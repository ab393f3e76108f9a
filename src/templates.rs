use anyhow::{Context, Result};
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::paths::Item;

const BUILTIN_TEMPLATE: &str = include_str!("../templates/base.html");
pub const BUILTIN_STYLESHEET: &str = include_str!("../templates/assets/style.css");

/// Everything a single rendered page needs.
pub struct Page<'a> {
	pub site_title: &'a str,
	pub title: String,
	pub section_title: Option<String>,
	pub html_content: &'a str,
	pub current_path: &'a str,
	pub sidebar: Vec<&'a Item>,
}

pub struct TemplateEngine {
	base_template: String,
}

impl TemplateEngine {
	/// Use the theme's `base.html` when it has one, the built-in template
	/// otherwise.
	pub fn new(theme_dir: Option<&Path>) -> Result<Self> {
		let themed = theme_dir.map(|dir| dir.join("base.html")).filter(|p| p.is_file());

		let base_template = match themed {
			Some(path) => fs::read_to_string(&path)
				.with_context(|| format!("Failed to read template: {}", path.display()))?,
			None => BUILTIN_TEMPLATE.to_string(),
		};

		Ok(Self { base_template })
	}

	pub fn render_page(&self, page: &Page<'_>, output_path: &Path) -> Result<()> {
		if let Some(parent) = output_path.parent() {
			fs::create_dir_all(parent)?;
		}

		fs::write(output_path, self.render(page))
			.with_context(|| format!("Failed to write {}", output_path.display()))?;
		Ok(())
	}

	/// Substitutes every `{{NAME}}` placeholder in one pass, so text coming
	/// from content is never itself treated as a placeholder. Unknown
	/// placeholders are left alone.
	fn render(&self, page: &Page<'_>) -> String {
		let title = escape_html(&page.title);
		let site_title = escape_html(page.site_title);
		let page_title = if title.is_empty() {
			site_title.clone()
		} else {
			format!("{} - {}", title, site_title)
		};
		let section_title = escape_html(page.section_title.as_deref().unwrap_or(""));
		let sidebar = render_sidebar(&page.sidebar, page.current_path);

		placeholder_regex()
			.replace_all(&self.base_template, |caps: &Captures| {
				match &caps[1] {
					"SITE_TITLE" => site_title.as_str(),
					"PAGE_TITLE" => page_title.as_str(),
					"TITLE" => title.as_str(),
					"SECTION_TITLE" => section_title.as_str(),
					"SIDEBAR" => sidebar.as_str(),
					"CONTENT" => page.html_content,
					_ => &caps[0],
				}
				.to_string()
			})
			.into_owned()
	}
}

fn placeholder_regex() -> &'static Regex {
	static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
	PLACEHOLDER.get_or_init(|| Regex::new(r"\{\{([A-Z_]+)\}\}").expect("valid placeholder pattern"))
}

/// Escape text for use in element content and double-quoted attributes.
pub(crate) fn escape_html(text: &str) -> String {
	let mut escaped = String::with_capacity(text.len());
	for c in text.chars() {
		match c {
			'&' => escaped.push_str("&amp;"),
			'<' => escaped.push_str("&lt;"),
			'>' => escaped.push_str("&gt;"),
			'"' => escaped.push_str("&quot;"),
			'\'' => escaped.push_str("&#39;"),
			_ => escaped.push(c),
		}
	}
	escaped
}

/// Public URL of an item: `index` is the site root, everything else gets a
/// directory of its own.
pub fn item_href(path: &str) -> String {
	match path {
		crate::paths::INDEX_ITEM => "/".to_string(),
		_ => format!("/{}/", path.trim_end_matches("/index")),
	}
}

fn render_sidebar(items: &[&Item], current_path: &str) -> String {
	if items.is_empty() {
		return String::new();
	}

	let mut html = String::from("<nav class=\"sidebar\">\n<ul>\n");
	for item in items {
		let active = if item.path == current_path {
			" class=\"active\""
		} else {
			""
		};
		let label = item.title.as_deref().unwrap_or(&item.path);
		html.push_str(&format!(
			"<li{}><a href=\"{}\">{}</a></li>\n",
			active,
			escape_html(&item_href(&item.path)),
			escape_html(label)
		));
	}
	html.push_str("</ul>\n</nav>");
	html
}
