//! The operations the CLI dispatches to, each runnable through
//! [`crate::runner::execute`].

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::generator::{theme_dir, Generator};
use crate::runner::Operation;
use crate::scaffold::{self, BOILERPLATES};
use crate::server::{DevServer, SiteServer};
use crate::{deploy, themes};

/// Lay down `config.boilerplate` in `config.output`.
pub struct Init;

#[async_trait]
impl Operation for Init {
	async fn run(&self, config: &Config) -> Result<()> {
		let files = scaffold::scaffold(config)?;
		config.console.info(&format!(
			"Wrote {} files to {}",
			files,
			config.output.display()
		));
		Ok(())
	}
}

/// Install the theme directory named by `config.theme` and activate it in
/// the project file.
pub struct Install {
	pub project_file: PathBuf,
}

#[async_trait]
impl Operation for Install {
	async fn run(&self, config: &Config) -> Result<()> {
		let source = config.theme.as_deref().context("No theme given")?;
		let name = themes::install(Path::new(source), config, &self.project_file)?;
		config
			.console
			.info(&format!("Installed theme `{}` into {}", name, config.themes.display()));
		Ok(())
	}
}

pub struct List;

#[async_trait]
impl Operation for List {
	async fn run(&self, config: &Config) -> Result<()> {
		config.console.info("Boilerplates:");
		for boilerplate in &BOILERPLATES {
			config
				.console
				.info(&format!("  {} - {}", boilerplate.name, boilerplate.description));
		}

		let installed = themes::installed(config)?;
		if installed.is_empty() {
			config
				.console
				.info(&format!("No themes installed in {}", config.themes.display()));
			return Ok(());
		}

		config.console.info("Themes:");
		for name in installed {
			let marker = if config.theme.as_deref() == Some(name.as_str()) {
				" (active)"
			} else {
				""
			};
			config.console.info(&format!("  {}{}", name, marker));
		}
		Ok(())
	}
}

pub struct Build;

#[async_trait]
impl Operation for Build {
	async fn run(&self, config: &Config) -> Result<()> {
		if let Some(theme) = theme_dir(config).filter(|dir| !dir.is_dir()) {
			config
				.console
				.warn(&format!("Theme directory {} is missing", theme.display()));
		}

		let report = Generator::new(config)?.build().await?;
		config.console.info(&format!(
			"Wrote {} pages to {}",
			report.pages,
			config.output.display()
		));
		Ok(())
	}
}

pub struct Serve;

#[async_trait]
impl Operation for Serve {
	async fn run(&self, config: &Config) -> Result<()> {
		SiteServer::new(config).serve().await
	}
}

pub struct Develop;

#[async_trait]
impl Operation for Develop {
	async fn run(&self, config: &Config) -> Result<()> {
		DevServer::new(config)?.serve().await
	}
}

pub struct Deploy {
	pub project_root: PathBuf,
}

#[async_trait]
impl Operation for Deploy {
	async fn run(&self, config: &Config) -> Result<()> {
		deploy::deploy(config, &self.project_root).await
	}
}
