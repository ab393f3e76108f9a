use anyhow::Result;
use clap::{CommandFactory, Parser};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{resolve, Config, OverrideSource, DEFAULT_CONFIG_FILE, PLUGIN_BOILERPLATE};
use crate::operations::{Build, Deploy, Develop, Init, Install, List, Serve};
use crate::runner::{execute, ExecutionRecord, Operation};

#[derive(Parser, Debug, Default)]
#[command(name = "antwar")]
#[command(about = "Build, serve and deploy Antwar sites")]
#[command(version)]
pub struct Cli {
	/// Path to configuration file (defaults to antwar.toml) or settings as a querystring
	#[arg(short, long, value_name = "FILE")]
	pub config: Option<String>,

	/// Initialize a project
	#[arg(short, long, value_name = "DIRECTORY")]
	pub init: Option<PathBuf>,

	/// Install a theme and attach it to the project
	#[arg(short = 'I', long, value_name = "THEME")]
	pub install: Option<String>,

	/// Initialize a plugin
	#[arg(short, long, value_name = "DIRECTORY")]
	pub plugin: Option<PathBuf>,

	/// Build site
	#[arg(short, long)]
	pub build: bool,

	/// List boilerplates and installed themes
	#[arg(short, long)]
	pub list: bool,

	/// Serve site. Port defaults to 3000
	#[arg(short, long, value_name = "PORT", num_args = 0..=1)]
	pub serve: Option<Option<u16>>,

	/// Deploy to branch (defaults to gh-pages)
	#[arg(short = 'D', long)]
	pub deploy: bool,

	/// Build, watch and serve in development mode
	#[arg(short, long)]
	pub develop: bool,
}

/// The single operation a command line selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
	Init(PathBuf),
	Install(String),
	Plugin(PathBuf),
	Build,
	Serve(Option<u16>),
	List,
	Deploy,
	Develop,
}

impl Command {
	pub fn display_name(&self) -> &'static str {
		match self {
			Command::Init(_) => "project initialization",
			Command::Install(_) => "installing",
			Command::Plugin(_) => "plugin initialization",
			Command::Build => "building",
			Command::Serve(_) => "serving",
			Command::List => "listing",
			Command::Deploy => "deployment",
			Command::Develop => "developing",
		}
	}
}

impl Cli {
	/// First requested operation in priority order; any further flags are
	/// ignored.
	pub fn selected(&self) -> Option<Command> {
		if let Some(dir) = &self.init {
			Some(Command::Init(dir.clone()))
		} else if let Some(theme) = &self.install {
			Some(Command::Install(theme.clone()))
		} else if let Some(dir) = &self.plugin {
			Some(Command::Plugin(dir.clone()))
		} else if self.build {
			Some(Command::Build)
		} else if let Some(port) = self.serve {
			Some(Command::Serve(port))
		} else if self.list {
			Some(Command::List)
		} else if self.deploy {
			Some(Command::Deploy)
		} else if self.develop {
			Some(Command::Develop)
		} else {
			None
		}
	}

	fn is_bare(&self) -> bool {
		self.config.is_none() && self.selected().is_none()
	}

	/// Effective configuration for `command`. Initialization never reads
	/// project configuration.
	pub fn effective_config(&self, command: &Command, defaults: Config, cwd: &Path) -> Config {
		let mut config = match command {
			Command::Init(_) => defaults,
			_ => {
				let source = OverrideSource::from_flag(self.config.as_deref());
				resolve(defaults, Some(&source), cwd)
			}
		};

		match command {
			Command::Init(dir) => config.output = dir.clone(),
			Command::Plugin(dir) => {
				config.output = dir.clone();
				config.boilerplate = PLUGIN_BOILERPLATE.to_string();
			}
			Command::Install(theme) => config.theme = Some(theme.clone()),
			Command::Serve(Some(port)) => config.port = *port,
			_ => {}
		}

		config
	}

	pub async fn run(self, started: Instant) -> Result<Option<ExecutionRecord>> {
		if self.is_bare() {
			Cli::command().print_help()?;
			return Ok(None);
		}

		let cwd = std::env::current_dir()?;
		self.dispatch(Config::default(), &cwd, started).await
	}

	/// Resolve configuration against `cwd` and run the selected operation
	/// through [`execute`]. Nothing runs when no operation is selected.
	pub async fn dispatch(
		&self,
		defaults: Config,
		cwd: &Path,
		started: Instant,
	) -> Result<Option<ExecutionRecord>> {
		let Some(command) = self.selected() else {
			return Ok(None);
		};

		let config = self.effective_config(&command, defaults, cwd);
		tracing::debug!(?command, ?config, "dispatching");

		let operation: Box<dyn Operation> = match &command {
			Command::Init(_) | Command::Plugin(_) => Box::new(Init),
			Command::Install(_) => Box::new(Install {
				project_file: self.project_file(cwd),
			}),
			Command::Build => Box::new(Build),
			Command::Serve(_) => Box::new(Serve),
			Command::List => Box::new(List),
			Command::Deploy => Box::new(Deploy {
				project_root: cwd.to_path_buf(),
			}),
			Command::Develop => Box::new(Develop),
		};

		let hint = || {
			config.console.info(&format!(
				"Go to `{}` and hit `antwar --develop` to get started",
				config.output.display()
			));
		};
		let on_success: Option<&dyn Fn()> = match &command {
			Command::Init(_) => Some(&hint),
			_ => None,
		};

		let record = execute(
			&*config.console,
			started,
			command.display_name(),
			operation.as_ref(),
			&config,
			on_success,
		)
		.await;

		Ok(Some(record))
	}

	/// The configuration file settings were read from, which is where an
	/// installed theme gets recorded.
	fn project_file(&self, cwd: &Path) -> PathBuf {
		OverrideSource::from_flag(self.config.as_deref())
			.file(cwd)
			.unwrap_or_else(|| cwd.join(DEFAULT_CONFIG_FILE))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::console::testing::{Channel, RecordingLogger};
	use crate::console::SharedLogger;
	use crate::runner::Outcome;
	use std::fs;
	use std::sync::Arc;

	fn parse(args: &[&str]) -> Cli {
		Cli::try_parse_from(std::iter::once("antwar").chain(args.iter().copied())).unwrap()
	}

	#[test]
	fn cli_definition_is_valid() {
		Cli::command().debug_assert();
	}

	#[test]
	fn no_flags_selects_nothing() {
		let cli = parse(&[]);
		assert_eq!(cli.selected(), None);
		assert!(cli.is_bare());

		let config_only = parse(&["--config", "port=1"]);
		assert_eq!(config_only.selected(), None);
		assert!(!config_only.is_bare());
	}

	#[test]
	fn first_flag_in_priority_order_wins() {
		assert_eq!(parse(&["--develop", "--build"]).selected(), Some(Command::Build));
		assert_eq!(
			parse(&["-l", "-D", "-i", "site"]).selected(),
			Some(Command::Init(PathBuf::from("site")))
		);
		assert_eq!(parse(&["-s", "-l"]).selected(), Some(Command::Serve(None)));
		assert_eq!(parse(&["-D", "-d"]).selected(), Some(Command::Deploy));
	}

	#[test]
	fn serve_port_is_optional() {
		assert_eq!(parse(&["--serve"]).selected(), Some(Command::Serve(None)));
		assert_eq!(parse(&["--serve", "8080"]).selected(), Some(Command::Serve(Some(8080))));
		assert!(Cli::try_parse_from(["antwar", "--serve", "http"]).is_err());
	}

	fn recorded_defaults() -> (Config, Arc<RecordingLogger>) {
		let recorder = Arc::new(RecordingLogger::default());
		let config = Config {
			console: SharedLogger::new(recorder.clone()),
			..Config::default()
		};
		(config, recorder)
	}

	#[test]
	fn init_skips_project_configuration() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "blogRoot = \"news\"\n").unwrap();
		let (defaults, recorder) = recorded_defaults();

		let cli = parse(&["--init", "fresh"]);
		let command = cli.selected().unwrap();
		let config = cli.effective_config(&command, defaults, dir.path());

		assert_eq!(config.blog_root, "blog");
		assert_eq!(config.output, PathBuf::from("fresh"));
		assert!(recorder.lines().is_empty());
	}

	#[test]
	fn plugin_switches_boilerplate() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join(DEFAULT_CONFIG_FILE), "").unwrap();
		let (defaults, _) = recorded_defaults();

		let cli = parse(&["--plugin", "search"]);
		let config = cli.effective_config(&cli.selected().unwrap(), defaults, dir.path());

		assert_eq!(config.output, PathBuf::from("search"));
		assert_eq!(config.boilerplate, PLUGIN_BOILERPLATE);
	}

	#[test]
	fn serve_port_overrides_configuration() {
		let dir = tempfile::tempdir().unwrap();
		let (defaults, _) = recorded_defaults();

		let cli = parse(&["--serve", "8080", "--config", "port=4000"]);
		let config = cli.effective_config(&cli.selected().unwrap(), defaults.clone(), dir.path());
		assert_eq!(config.port, 8080);

		let cli = parse(&["--serve", "--config", "port=4000"]);
		let config = cli.effective_config(&cli.selected().unwrap(), defaults, dir.path());
		assert_eq!(config.port, 4000);
	}

	#[test]
	fn missing_project_file_is_reported_once() {
		let dir = tempfile::tempdir().unwrap();
		let (defaults, recorder) = recorded_defaults();

		let cli = parse(&["--build"]);
		let config = cli.effective_config(&cli.selected().unwrap(), defaults.clone(), dir.path());

		assert_eq!(config, defaults);
		assert_eq!(recorder.count(Channel::Error), 1);
	}

	#[test]
	fn installed_theme_is_recorded_in_the_given_config_file() {
		let cwd = Path::new("/srv/site");
		assert_eq!(
			parse(&["--install", "dusk", "--config", "site.json"]).project_file(cwd),
			cwd.join("site.json")
		);
		assert_eq!(parse(&["--install", "dusk"]).project_file(cwd), cwd.join(DEFAULT_CONFIG_FILE));
		assert_eq!(
			parse(&["--install", "dusk", "--config", "title=x"]).project_file(cwd),
			cwd.join(DEFAULT_CONFIG_FILE)
		);
	}

	#[tokio::test]
	async fn nothing_selected_runs_nothing() {
		let dir = tempfile::tempdir().unwrap();
		let (defaults, recorder) = recorded_defaults();

		let record = parse(&["--config", "port=1"])
			.dispatch(defaults, dir.path(), Instant::now())
			.await
			.unwrap();

		assert!(record.is_none());
		assert!(recorder.lines().is_empty());
	}

	#[tokio::test]
	async fn init_hint_follows_finish_and_precedes_elapsed_time() {
		let dir = tempfile::tempdir().unwrap();
		let site = dir.path().join("site");
		let (defaults, recorder) = recorded_defaults();

		let record = parse(&["--init", site.to_str().unwrap()])
			.dispatch(defaults, dir.path(), Instant::now())
			.await
			.unwrap()
			.unwrap();

		assert_eq!(record.outcome, Outcome::Succeeded);
		assert!(site.join(DEFAULT_CONFIG_FILE).is_file());

		let messages = recorder.messages();
		let position = |needle: &str| {
			messages
				.iter()
				.position(|m| m.contains(needle))
				.unwrap_or_else(|| panic!("no `{}` in {:?}", needle, messages))
		};
		assert_eq!(position("Start project initialization"), 0);
		assert!(position("Project initialization finished") < position("antwar --develop"));
		assert_eq!(position("antwar --develop"), messages.len() - 2);
		assert!(messages[messages.len() - 1].starts_with("Time elapsed"));
	}

	#[tokio::test]
	async fn failed_build_reports_without_hint() {
		let dir = tempfile::tempdir().unwrap();
		let missing = dir.path().join("no-content");
		let query = format!(
			"content={}&output={}",
			missing.display(),
			dir.path().join("build").display()
		);
		let (defaults, recorder) = recorded_defaults();

		let record = parse(&["--build", "--config", query.as_str()])
			.dispatch(defaults, dir.path(), Instant::now())
			.await
			.unwrap()
			.unwrap();

		assert_eq!(record.outcome, Outcome::Failed);
		assert_eq!(recorder.count(Channel::Error), 1);

		let messages = recorder.messages();
		assert_eq!(messages.len(), 3, "{:?}", messages);
		assert_eq!(messages[0], "Start building");
		assert!(messages[1].starts_with("Building failed"));
		assert!(messages[2].starts_with("Time elapsed"));
		assert!(!messages.iter().any(|m| m.contains("antwar --develop")));
	}
}
