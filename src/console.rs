use chrono::Local;
use colored::Colorize;
use std::fmt;
use std::sync::Arc;

/// Four-channel console handed to every operation.
pub trait Logger: Send + Sync {
	fn log(&self, message: &str);
	fn info(&self, message: &str);
	fn warn(&self, message: &str);
	fn error(&self, message: &str);
}

/// Timestamped, colored console writing to stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrettyConsole;

fn timestamp() -> String {
	Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Logger for PrettyConsole {
	fn log(&self, message: &str) {
		println!("{} {}", timestamp(), message.green());
	}

	fn info(&self, message: &str) {
		println!("{} {}", timestamp(), message.blue());
	}

	fn warn(&self, message: &str) {
		eprintln!("{} {}", timestamp(), message.yellow());
	}

	fn error(&self, message: &str) {
		eprintln!("{} {}", timestamp(), message.bold().red());
	}
}

/// Shared handle to the active logger, carried inside [`crate::config::Config`].
///
/// Loggers never take part in config equality: two configs that differ only
/// in where they log compare equal.
#[derive(Clone)]
pub struct SharedLogger(Arc<dyn Logger>);

impl SharedLogger {
	pub fn new(logger: Arc<dyn Logger>) -> Self {
		Self(logger)
	}
}

impl Default for SharedLogger {
	fn default() -> Self {
		Self(Arc::new(PrettyConsole))
	}
}

impl std::ops::Deref for SharedLogger {
	type Target = dyn Logger;

	fn deref(&self) -> &Self::Target {
		self.0.as_ref()
	}
}

impl fmt::Debug for SharedLogger {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SharedLogger")
	}
}

impl PartialEq for SharedLogger {
	fn eq(&self, _other: &Self) -> bool {
		true
	}
}
