use anyhow::{bail, Context, Result};
use chrono::Local;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::process::Command;

use crate::config::Config;

/// Publish the built site as a single commit on `deploy.branch` of
/// `deploy.remote`, replacing whatever the branch held before.
///
/// The throwaway repository lives in a temporary directory, so the output
/// directory is never touched whether or not the push succeeds.
pub async fn deploy(config: &Config, project_root: &Path) -> Result<()> {
	let output_dir = project_root.join(&config.output);
	if !output_dir.is_dir() {
		bail!(
			"Nothing to deploy at {}, build the site first",
			output_dir.display()
		);
	}
	if fs::canonicalize(&output_dir)? == fs::canonicalize(project_root)? {
		bail!(
			"Refusing to deploy the project root {}, set `output` to the build directory",
			output_dir.display()
		);
	}

	let remote = remote_url(&config.deploy.remote, project_root).await?;
	let branch = config.deploy.branch.as_str();
	config
		.console
		.info(&format!("Deploying {} to {} ({})", output_dir.display(), remote, branch));

	let repo = Scratch::new(&output_dir)?;
	let head = format!("refs/heads/{}", branch);
	let message = format!("Deploy {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
	repo.git(&["init", "--quiet"]).await?;
	repo.git(&["symbolic-ref", "HEAD", head.as_str()]).await?;
	repo.git(&["add", "--all"]).await?;
	repo.git(&["commit", "--quiet", "-m", message.as_str()]).await?;
	repo.git(&["push", "--force", remote.as_str(), branch]).await?;
	Ok(())
}

/// A git directory outside the work tree; removed when dropped.
struct Scratch {
	git_dir: TempDir,
	work_tree: PathBuf,
}

impl Scratch {
	fn new(work_tree: &Path) -> Result<Self> {
		let git_dir = tempfile::Builder::new()
			.prefix("antwar-deploy")
			.tempdir()
			.context("Failed to create a temporary git directory")?;
		Ok(Self {
			git_dir,
			work_tree: work_tree.to_path_buf(),
		})
	}

	async fn git(&self, args: &[&str]) -> Result<String> {
		let mut full = vec![
			OsStr::new("--git-dir").to_os_string(),
			self.git_dir.path().as_os_str().to_os_string(),
			OsStr::new("--work-tree").to_os_string(),
			self.work_tree.as_os_str().to_os_string(),
		];
		full.extend(args.iter().map(|a| OsStr::new(a).to_os_string()));
		run_git(&self.work_tree, &full, args).await
	}
}

/// Remote names are looked up in the project repository; anything that
/// already looks like a URL or path is used as is.
async fn remote_url(remote: &str, project_root: &Path) -> Result<String> {
	if is_location(remote) {
		return Ok(remote.to_string());
	}
	git(project_root, &["remote", "get-url", remote])
		.await
		.with_context(|| format!("Unknown git remote `{}`", remote))
}

fn is_location(remote: &str) -> bool {
	remote.contains(':') || remote.contains('/')
}

async fn git(dir: &Path, args: &[&str]) -> Result<String> {
	run_git(dir, args, args).await
}

async fn run_git<S: AsRef<OsStr>>(dir: &Path, args: &[S], shown: &[&str]) -> Result<String> {
	tracing::debug!(dir = %dir.display(), args = ?shown, "git");
	let output = Command::new("git")
		.args(args)
		.current_dir(dir)
		.output()
		.await
		.context("Failed to run git")?;

	if !output.status.success() {
		bail!(
			"git {} failed: {}",
			shown.join(" "),
			String::from_utf8_lossy(&output.stderr).trim()
		);
	}

	Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
