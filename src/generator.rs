use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::Config;
use crate::content::Document;
use crate::paths::{self, Item, Paths, RouteContext};
use crate::templates::{escape_html, item_href, Page, TemplateEngine, BUILTIN_STYLESHEET};

/// Renders the `content` tree of a project into static HTML.
pub struct Generator {
	config: Config,
	template_engine: TemplateEngine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
	pub pages: usize,
}

impl Generator {
	pub fn new(config: &Config) -> Result<Self> {
		let template_engine = TemplateEngine::new(theme_dir(config).as_deref())?;

		Ok(Self {
			config: config.clone(),
			template_engine,
		})
	}

	pub fn output_dir(&self) -> &Path {
		&self.config.output
	}

	pub async fn build(&self) -> Result<BuildReport> {
		let content_dir = &self.config.content;
		if !content_dir.is_dir() {
			bail!("Content directory not found: {}", content_dir.display());
		}

		let output_dir = &self.config.output;
		if output_dir.exists() {
			fs::remove_dir_all(output_dir)
				.with_context(|| format!("Failed to clean {}", output_dir.display()))?;
		}
		fs::create_dir_all(output_dir)?;

		let documents = self.collect_documents()?;
		let paths = Paths::new(documents.iter().map(Document::to_item).collect());

		let mut pages = 0;
		for doc in &documents {
			self.render_document(doc, &paths)?;
			pages += 1;
		}

		if self.write_blog_index(&paths)? {
			pages += 1;
		}

		self.copy_assets()?;
		tracing::debug!(pages, output = %output_dir.display(), "site generated");

		Ok(BuildReport { pages })
	}

	fn collect_documents(&self) -> Result<Vec<Document>> {
		let content_dir = &self.config.content;
		let mut documents = Vec::new();

		for entry in WalkDir::new(content_dir)
			.follow_links(true)
			.into_iter()
			.filter_map(|e| e.ok())
		{
			let path = entry.path();
			let ext = path.extension().and_then(|s| s.to_str());
			if !path.is_file() || !matches!(ext, Some("md" | "markdown")) {
				continue;
			}

			match Document::parse(path, content_dir) {
				Ok(doc) if doc.frontmatter.draft => {
					tracing::debug!(path = %path.display(), "skipping draft");
				}
				Ok(doc) => documents.push(doc),
				Err(e) => self
					.config
					.console
					.warn(&format!("Failed to parse {}: {:#}", path.display(), e)),
			}
		}

		documents.sort_by(|a, b| {
			let a_order = a.frontmatter.order.unwrap_or(999);
			let b_order = b.frontmatter.order.unwrap_or(999);
			a_order
				.cmp(&b_order)
				.then_with(|| a.relative_path.cmp(&b.relative_path))
		});

		Ok(documents)
	}

	fn render_document(&self, doc: &Document, paths: &Paths) -> Result<()> {
		let ctx = RouteContext::for_page(&doc.relative_path);
		let current_path = doc.item_path();

		let page = Page {
			site_title: &self.config.title,
			title: paths::page_title(&ctx, paths),
			section_title: paths::section_title(&ctx, paths, &self.config)
				.or_else(|| paths::section_name(&ctx, paths)),
			html_content: &doc.html_content,
			current_path: &current_path,
			sidebar: paths::section_items(&ctx, paths),
		};

		self.template_engine
			.render_page(&page, &self.page_file(&current_path))
	}

	/// Lists the blog section newest first, unless the blog has its own index.
	fn write_blog_index(&self, paths: &Paths) -> Result<bool> {
		let blog_root = self.config.blog_root.trim_matches('/');
		if blog_root.is_empty() || paths.item_for_path(&format!("{}/index", blog_root)).is_some() {
			return Ok(false);
		}

		let ctx = RouteContext {
			routes: vec![paths::Route::default(), paths::Route::named(blog_root)],
			params: paths::RouteParams {
				item: None,
				splat: Some(blog_root.to_string()),
			},
		};
		let mut posts = paths::section_items(&ctx, paths);
		if posts.is_empty() {
			return Ok(false);
		}
		posts.sort_by(|a, b| b.date.cmp(&a.date));

		let listing = render_listing(&posts);
		let title = paths::section_title(&ctx, paths, &self.config).unwrap_or_else(|| blog_root.to_string());
		let page = Page {
			site_title: &self.config.title,
			title: title.clone(),
			section_title: Some(title),
			html_content: &listing,
			current_path: blog_root,
			sidebar: Vec::new(),
		};

		self.template_engine
			.render_page(&page, &self.page_file(blog_root))?;
		Ok(true)
	}

	fn page_file(&self, item_path: &str) -> PathBuf {
		let href = item_href(item_path);
		self.config
			.output
			.join(href.trim_matches('/'))
			.join("index.html")
	}

	fn copy_assets(&self) -> Result<()> {
		let assets_dir = self.config.output.join("assets");
		fs::create_dir_all(&assets_dir)?;
		fs::write(assets_dir.join("style.css"), BUILTIN_STYLESHEET)?;

		if let Some(theme) = theme_dir(&self.config) {
			let theme_assets = theme.join("assets");
			if theme_assets.is_dir() {
				copy_dir(&theme_assets, &assets_dir)?;
			}
		}

		let project_assets = self
			.config
			.content
			.parent()
			.unwrap_or_else(|| Path::new("."))
			.join("assets");
		if project_assets.is_dir() {
			copy_dir(&project_assets, &assets_dir)?;
		}

		Ok(())
	}
}

fn render_listing(posts: &[&Item]) -> String {
	let mut html = String::from("<ul class=\"posts\">\n");
	for post in posts {
		let label = escape_html(post.title.as_deref().unwrap_or(&post.path));
		let href = escape_html(&item_href(&post.path));
		match &post.date {
			Some(date) => html.push_str(&format!(
				"<li><time>{}</time> <a href=\"{}\">{}</a></li>\n",
				escape_html(date),
				href,
				label
			)),
			None => html.push_str(&format!(
				"<li><a href=\"{}\">{}</a></li>\n",
				href,
				label
			)),
		}
	}
	html.push_str("</ul>\n");
	html
}

pub fn theme_dir(config: &Config) -> Option<PathBuf> {
	config.theme.as_ref().map(|theme| config.themes.join(theme))
}

/// Recursively copy `from` into `to`, creating directories as needed.
pub fn copy_dir(from: &Path, to: &Path) -> Result<()> {
	for entry in WalkDir::new(from).follow_links(true) {
		let entry = entry?;
		let relative = entry.path().strip_prefix(from)?;
		let target = to.join(relative);

		if entry.file_type().is_dir() {
			fs::create_dir_all(&target)?;
		} else {
			if let Some(parent) = target.parent() {
				fs::create_dir_all(parent)?;
			}
			fs::copy(entry.path(), &target).with_context(|| {
				format!("Failed to copy {} to {}", entry.path().display(), target.display())
			})?;
		}
	}

	Ok(())
}
