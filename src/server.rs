use anyhow::{Context, Result};
use axum::extract::Request;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use notify::{RecursiveMode, Watcher};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::console::SharedLogger;
use crate::generator::Generator;

/// Static file server over a built site.
pub struct SiteServer {
	root: PathBuf,
	port: u16,
	console: SharedLogger,
}

impl SiteServer {
	pub fn new(config: &Config) -> Self {
		Self {
			root: config.output.clone(),
			port: config.port,
			console: config.console.clone(),
		}
	}

	pub fn router(root: &Path) -> Router {
		Router::new()
			.fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
			.layer(
				ServiceBuilder::new()
					.layer(TraceLayer::new_for_http())
					.layer(middleware::from_fn(hide_dotfiles)),
			)
	}

	/// Serve until the process is stopped.
	pub async fn serve(&self) -> Result<()> {
		if !self.root.is_dir() {
			anyhow::bail!(
				"Nothing to serve at {}, build the site first",
				self.root.display()
			);
		}

		let addr = format!("0.0.0.0:{}", self.port);
		let listener = tokio::net::TcpListener::bind(&addr)
			.await
			.with_context(|| format!("Failed to bind {}", addr))?;

		self.console
			.info(&format!("Serving {} at http://localhost:{}", self.root.display(), self.port));

		axum::serve(listener, Self::router(&self.root)).await?;

		Ok(())
	}
}

/// Dotfiles and dot-directories (`.git`, `.env`) under the output are never served.
async fn hide_dotfiles(request: Request, next: Next) -> Response {
	let hidden = request
		.uri()
		.path()
		.split('/')
		.any(|segment| segment.starts_with('.') || segment.to_ascii_lowercase().starts_with("%2e"));
	if hidden {
		return StatusCode::NOT_FOUND.into_response();
	}
	next.run(request).await
}

/// Builds the site, rebuilds it whenever `content` changes and serves it.
pub struct DevServer {
	generator: Arc<Generator>,
	content_dir: PathBuf,
	server: SiteServer,
}

impl DevServer {
	pub fn new(config: &Config) -> Result<Self> {
		Ok(Self {
			generator: Arc::new(Generator::new(config)?),
			content_dir: config.content.clone(),
			server: SiteServer::new(config),
		})
	}

	pub async fn serve(&self) -> Result<()> {
		let report = self.generator.build().await?;
		self.server
			.console
			.info(&format!("Built {} pages", report.pages));

		// Get a handle to the current tokio runtime to use inside the watcher thread
		let rt = tokio::runtime::Handle::current();

		let mut watcher = notify::recommended_watcher({
			let generator = Arc::clone(&self.generator);
			let console = self.server.console.clone();
			let output_dir = canonical(self.generator.output_dir());

			move |event: Result<notify::Event, notify::Error>| {
				let Ok(event) = event else {
					return;
				};
				if !(event.kind.is_modify() || event.kind.is_create() || event.kind.is_remove()) {
					return;
				}
				// Writes into the output directory must not retrigger a build.
				if only_touches(&event.paths, &output_dir) {
					return;
				}

				let generator = Arc::clone(&generator);
				let console = console.clone();
				rt.spawn(async move {
					match generator.build().await {
						Ok(report) => console.log(&format!("Rebuilt {} pages", report.pages)),
						Err(e) => console.error(&format!("Rebuild failed {:#}", e)),
					}
				});
			}
		})?;

		watcher.watch(&canonical(&self.content_dir), RecursiveMode::Recursive)?;
		self.server.console.info("Watching for changes...");

		self.server.serve().await
	}
}

/// Absolute, symlink-free form of `path`. Paths that do not exist yet are
/// anchored at the working directory instead.
fn canonical(path: &Path) -> PathBuf {
	fs::canonicalize(path).unwrap_or_else(|_| {
		std::env::current_dir()
			.map(|cwd| cwd.join(path))
			.unwrap_or_else(|_| path.to_path_buf())
	})
}

/// Watch events report paths under the canonical watch root, so both sides
/// of the comparison must be canonical.
fn only_touches(paths: &[PathBuf], dir: &Path) -> bool {
	paths.iter().all(|p| p.starts_with(dir))
}

#[cfg(test)]
mod tests {
	use super::*;
	use axum::body::Body;
	use axum::http::{Request, StatusCode};
	use std::fs;
	use tower::ServiceExt;

	#[tokio::test]
	async fn router_serves_directory_index() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(dir.path().join("blog")).unwrap();
		fs::write(dir.path().join("blog/index.html"), "<p>blog</p>").unwrap();

		let response = SiteServer::router(dir.path())
			.oneshot(Request::builder().uri("/blog/").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(response.status(), StatusCode::OK);

		let missing = SiteServer::router(dir.path())
			.oneshot(Request::builder().uri("/nope/").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(missing.status(), StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn router_hides_dotfiles() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(dir.path().join(".git")).unwrap();
		fs::write(dir.path().join(".git/config"), "[remote]").unwrap();
		fs::write(dir.path().join("index.html"), "<p>home</p>").unwrap();

		for uri in ["/.git/config", "/.git/", "/%2Egit/config"] {
			let response = SiteServer::router(dir.path())
				.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
				.await
				.unwrap();
			assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
		}

		let home = SiteServer::router(dir.path())
			.oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
			.await
			.unwrap();
		assert_eq!(home.status(), StatusCode::OK);
	}

	#[test]
	fn output_events_match_unnormalized_paths() {
		let dir = tempfile::tempdir().unwrap();
		fs::create_dir_all(dir.path().join("content")).unwrap();
		fs::create_dir_all(dir.path().join("build")).unwrap();

		let root = canonical(&dir.path().join("."));
		let output = canonical(&dir.path().join("content/../build"));

		assert!(only_touches(&[root.join("build/index.html")], &output));
		assert!(!only_touches(&[root.join("content/index.md")], &output));
		assert!(!only_touches(
			&[root.join("build/index.html"), root.join("content/index.md")],
			&output
		));
	}

	#[tokio::test]
	async fn serve_refuses_missing_output() {
		let dir = tempfile::tempdir().unwrap();
		let config = Config {
			output: dir.path().join("build"),
			..Config::default()
		};
		let err = SiteServer::new(&config).serve().await.unwrap_err();
		assert!(err.to_string().contains("build the site first"));
	}
}
