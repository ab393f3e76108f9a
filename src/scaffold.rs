use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::Path;

use crate::config::{Config, PLUGIN_BOILERPLATE, SITE_BOILERPLATE};

/// A project skeleton `antwar --init`/`--plugin` can lay down.
pub struct Boilerplate {
	pub name: &'static str,
	pub description: &'static str,
	files: &'static [(&'static str, &'static str)],
}

pub static BOILERPLATES: [Boilerplate; 2] = [
	Boilerplate {
		name: SITE_BOILERPLATE,
		description: "Site with a front page and a blog",
		files: &[
			(
				"antwar.toml",
				r#"title = "{{TITLE}}"
blogRoot = "{{BLOG_ROOT}}"
port = {{PORT}}

[deploy]
branch = "{{DEPLOY_BRANCH}}"

[paths.{{BLOG_ROOT}}]
title = "Blog"
"#,
			),
			(
				"content/index.md",
				r#"---
title: Welcome
---

This is the front page of your new site. Edit `content/index.md` to change it.

Posts live under `content/{{BLOG_ROOT}}/`.
"#,
			),
			(
				"content/{{BLOG_ROOT}}/hello-world.md",
				r#"---
title: Hello World
date: 2015-01-01
---

Your first post. Link to other pages with [[Wiki Links]].
"#,
			),
			("assets/.gitkeep", ""),
		],
	},
	Boilerplate {
		name: PLUGIN_BOILERPLATE,
		description: "Plugin skeleton",
		files: &[
			(
				"plugin.toml",
				r#"name = "{{NAME}}"
description = ""
"#,
			),
			(
				"README.md",
				r#"# {{NAME}}

An Antwar plugin.
"#,
			),
			(
				"src/index.md",
				r#"---
title: {{NAME}}
---

Plugin documentation.
"#,
			),
		],
	},
];

pub fn find(name: &str) -> Option<&'static Boilerplate> {
	BOILERPLATES.iter().find(|b| b.name == name)
}

/// Write the boilerplate selected by `config.boilerplate` into `config.output`.
///
/// Returns the number of files written. The target must be missing or empty.
pub fn scaffold(config: &Config) -> Result<usize> {
	let boilerplate = find(&config.boilerplate)
		.ok_or_else(|| anyhow!("Unknown boilerplate `{}`", config.boilerplate))?;
	let target = &config.output;

	if target.exists() && fs::read_dir(target)?.next().is_some() {
		bail!("{} is not empty", target.display());
	}

	let name = target
		.file_name()
		.map(|n| n.to_string_lossy().to_string())
		.unwrap_or_else(|| boilerplate.name.to_string());
	let fill = |text: &str| {
		text.replace("{{TITLE}}", &config.title)
			.replace("{{BLOG_ROOT}}", &config.blog_root)
			.replace("{{PORT}}", &config.port.to_string())
			.replace("{{DEPLOY_BRANCH}}", &config.deploy.branch)
			.replace("{{NAME}}", &name)
	};

	for &(path, body) in boilerplate.files {
		write_file(&target.join(fill(path)), &fill(body))?;
	}

	tracing::debug!(boilerplate = boilerplate.name, target = %target.display(), "scaffolded");
	Ok(boilerplate.files.len())
}

fn write_file(path: &Path, body: &str) -> Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent)?;
	}
	fs::write(path, body).with_context(|| format!("Failed to write {}", path.display()))
}
