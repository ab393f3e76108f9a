//! Page and section metadata derived from the route being rendered.
//!
//! Everything here is a pure function of a [`RouteContext`] and the
//! [`Paths`] index of known items; nothing reaches for ambient router state.

use std::path::Path;

use crate::config::{Config, SectionConfig};

/// Item path used when a route carries neither `item` nor `splat`.
pub const INDEX_ITEM: &str = "index";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Route {
	pub name: Option<String>,
}

impl Route {
	pub fn named(name: impl Into<String>) -> Self {
		Self {
			name: Some(name.into()),
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams {
	pub item: Option<String>,
	pub splat: Option<String>,
}

/// The matched route chain, outermost first, plus its parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteContext {
	pub routes: Vec<Route>,
	pub params: RouteParams,
}

impl RouteContext {
	/// Route for a content file at `relative` (e.g. `blog/2020/hello.md`).
	///
	/// The first directory names the section; the remaining directories end
	/// up in `splat`.
	pub fn for_page(relative: &Path) -> Self {
		let stem = relative
			.file_stem()
			.map(|s| s.to_string_lossy().to_string())
			.unwrap_or_default();
		let dirs: Vec<String> = relative
			.parent()
			.map(|p| {
				p.components()
					.map(|c| c.as_os_str().to_string_lossy().to_string())
					.collect()
			})
			.unwrap_or_default();

		let mut routes = vec![Route::default()];
		if let Some(section) = dirs.first() {
			routes.push(Route::named(section.clone()));
		}
		routes.push(Route::named(format!("/{}", stem)));

		Self {
			routes,
			params: RouteParams {
				item: Some(stem),
				splat: (!dirs.is_empty()).then(|| dirs.join("/")),
			},
		}
	}
}

/// A page known to the site. Both `section` and `title` may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
	/// Slash-separated path without extension, e.g. `blog/hello`.
	pub path: String,
	pub section: Option<String>,
	pub title: Option<String>,
	pub date: Option<String>,
}

/// Every item of the site, in navigation order.
#[derive(Debug, Clone, Default)]
pub struct Paths {
	items: Vec<Item>,
}

impl Paths {
	pub fn new(items: Vec<Item>) -> Self {
		Self { items }
	}

	pub fn all_items(&self) -> &[Item] {
		&self.items
	}

	pub fn item_for_path(&self, path: &str) -> Option<&Item> {
		let path = path.trim_start_matches('/');
		self.items.iter().find(|item| item.path == path)
	}
}

/// The item the route points at: `splat/item`, else `item`, else the index.
pub fn item<'a>(ctx: &RouteContext, paths: &'a Paths) -> Option<&'a Item> {
	let params = &ctx.params;
	match (&params.splat, &params.item) {
		(Some(splat), Some(item)) => paths.item_for_path(&format!("{}/{}", splat, item)),
		(Some(splat), None) => paths.item_for_path(splat),
		(None, Some(item)) => paths.item_for_path(item),
		(None, None) => paths.item_for_path(INDEX_ITEM),
	}
}

/// The item's own section, else the name of the second route in the chain.
pub fn section_name(ctx: &RouteContext, paths: &Paths) -> Option<String> {
	item(ctx, paths)
		.and_then(|item| item.section.clone())
		.or_else(|| ctx.routes.get(1).and_then(|route| route.name.clone()))
}

pub fn section<'a>(ctx: &RouteContext, paths: &Paths, config: &'a Config) -> Option<&'a SectionConfig> {
	section_name(ctx, paths).and_then(|name| config.paths.get(&name))
}

pub fn section_title(ctx: &RouteContext, paths: &Paths, config: &Config) -> Option<String> {
	section(ctx, paths, config).and_then(|section| section.title.clone())
}

pub fn section_items<'a>(ctx: &RouteContext, paths: &'a Paths) -> Vec<&'a Item> {
	let name = section_name(ctx, paths);
	paths
		.all_items()
		.iter()
		.filter(|item| item.section == name)
		.collect()
}

/// The item's title, else the last route's name without its first `/`.
pub fn page_title(ctx: &RouteContext, paths: &Paths) -> String {
	if let Some(title) = item(ctx, paths).and_then(|item| item.title.clone()) {
		return title;
	}

	ctx.routes
		.last()
		.and_then(|route| route.name.as_deref())
		.map(|name| name.replacen('/', "", 1))
		.unwrap_or_default()
}
