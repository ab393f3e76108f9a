use anyhow::Result;
use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::config::Config;
use crate::console::Logger;

/// A named unit of work the CLI can run: build, serve, deploy, ...
#[async_trait]
pub trait Operation: Send + Sync {
	async fn run(&self, config: &Config) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
	Succeeded,
	Failed,
}

/// What happened during one [`execute`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRecord {
	pub name: String,
	pub outcome: Outcome,
	/// The instant elapsed time is measured from, usually process start.
	pub started: Instant,
	pub elapsed: Duration,
}

/// Run `operation`, bracketed by start, finish-or-fail and elapsed-time lines.
///
/// Operation errors are logged and reported through the returned record,
/// never propagated. `on_success` runs right after the finish line; if it
/// panics the panic unwinds out of this function, but the elapsed time is
/// still logged on the way out.
pub async fn execute(
	logger: &dyn Logger,
	started: Instant,
	name: &str,
	operation: &dyn Operation,
	config: &Config,
	on_success: Option<&dyn Fn()>,
) -> ExecutionRecord {
	let display_name = capitalize(name);

	logger.log(&format!("Start {}", name));

	let mut finalizer = Finalizer::new(logger, started);

	let outcome = match operation.run(config).await {
		Ok(()) => {
			logger.log(&format!("{} finished", display_name));
			if let Some(callback) = on_success {
				callback();
			}
			Outcome::Succeeded
		}
		Err(e) => {
			logger.error(&format!("{} failed {:#}", display_name, e));
			Outcome::Failed
		}
	};

	let elapsed = finalizer.finish();
	tracing::debug!(name, ?outcome, ?elapsed, "operation settled");

	ExecutionRecord {
		name: name.to_string(),
		outcome,
		started,
		elapsed,
	}
}

/// Logs the elapsed time exactly once: on [`Finalizer::finish`] or, failing
/// that, when dropped during unwinding.
pub struct Finalizer<'a> {
	logger: &'a dyn Logger,
	started: Instant,
	finished_at: Option<Instant>,
	reported: bool,
}

impl<'a> Finalizer<'a> {
	pub fn new(logger: &'a dyn Logger, started: Instant) -> Self {
		Self {
			logger,
			started,
			finished_at: None,
			reported: false,
		}
	}

	/// Pin the end time instead of reading the clock when reporting.
	pub fn finished_at(mut self, at: Instant) -> Self {
		self.finished_at = Some(at);
		self
	}

	pub fn finish(&mut self) -> Duration {
		let end = self.finished_at.unwrap_or_else(Instant::now);
		let elapsed = end.saturating_duration_since(self.started);

		if !self.reported {
			self.reported = true;
			self.logger
				.info(&format!("Time elapsed: {}", format_elapsed(elapsed)));
		}

		elapsed
	}
}

impl Drop for Finalizer<'_> {
	fn drop(&mut self) {
		self.finish();
	}
}

/// Upper-case the first character, leave the rest untouched.
pub fn capitalize(name: &str) -> String {
	let mut chars = name.chars();
	match chars.next() {
		Some(first) => first.to_uppercase().chain(chars).collect(),
		None => String::new(),
	}
}

/// Largest whole unit that fits (`"2 minutes"`), or milliseconds below one
/// second.
pub fn format_elapsed(elapsed: Duration) -> String {
	const UNITS: [(&str, u64); 4] = [("day", 86_400), ("hour", 3_600), ("minute", 60), ("second", 1)];

	let seconds = elapsed.as_secs();
	for (unit, size) in UNITS {
		let count = seconds / size;
		if count > 0 {
			let plural = if count == 1 { "" } else { "s" };
			return format!("{} {}{}", count, unit, plural);
		}
	}

	format!("{} ms", elapsed.as_millis())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::console::testing::{Channel, RecordingLogger};
	use anyhow::anyhow;
	use std::cell::Cell;
	use std::panic::AssertUnwindSafe;

	struct Resolves(Duration);

	#[async_trait]
	impl Operation for Resolves {
		async fn run(&self, _config: &Config) -> Result<()> {
			tokio::time::sleep(self.0).await;
			Ok(())
		}
	}

	struct Rejects(&'static str);

	#[async_trait]
	impl Operation for Rejects {
		async fn run(&self, _config: &Config) -> Result<()> {
			Err(anyhow!(self.0))
		}
	}

	#[tokio::test]
	async fn success_logs_start_finish_elapsed_and_calls_back_once() {
		let logger = RecordingLogger::default();
		let calls = Cell::new(0);
		let callback = || {
			assert_eq!(logger.messages().len(), 2);
			calls.set(calls.get() + 1);
		};

		let record = execute(
			&logger,
			Instant::now(),
			"building",
			&Resolves(Duration::from_millis(5)),
			&Config::default(),
			Some(&callback),
		)
		.await;

		let messages = logger.messages();
		assert_eq!(messages.len(), 3);
		assert_eq!(messages[0], "Start building");
		assert_eq!(messages[1], "Building finished");
		assert!(messages[2].starts_with("Time elapsed: "));
		assert_eq!(calls.get(), 1);
		assert_eq!(record.outcome, Outcome::Succeeded);
		assert!(record.elapsed >= Duration::from_millis(5));
	}

	#[tokio::test]
	async fn failure_logs_error_and_skips_callback() {
		let logger = RecordingLogger::default();
		let calls = Cell::new(0);
		let callback = || calls.set(calls.get() + 1);

		let record = execute(
			&logger,
			Instant::now(),
			"serving",
			&Rejects("port in use"),
			&Config::default(),
			Some(&callback),
		)
		.await;

		let lines = logger.lines();
		assert_eq!(lines.len(), 3);
		assert_eq!(lines[0], (Channel::Log, "Start serving".to_string()));
		assert_eq!(lines[1], (Channel::Error, "Serving failed port in use".to_string()));
		assert_eq!(lines[2].0, Channel::Info);
		assert!(lines[2].1.starts_with("Time elapsed: "));
		assert_eq!(calls.get(), 0);
		assert_eq!(record.outcome, Outcome::Failed);
	}

	#[tokio::test]
	async fn record_keeps_the_start_instant_it_measured_from() {
		let logger = RecordingLogger::default();
		let started = Instant::now() - Duration::from_millis(40);

		let record = execute(
			&logger,
			started,
			"listing",
			&Resolves(Duration::ZERO),
			&Config::default(),
			None,
		)
		.await;

		assert_eq!(record.started, started);
		assert!(record.elapsed >= Duration::from_millis(40));
		assert!(record.started + record.elapsed <= Instant::now());
	}

	#[tokio::test]
	async fn slow_logger_still_reports_elapsed_once() {
		let logger = RecordingLogger::delayed(Duration::from_millis(20));

		execute(
			&logger,
			Instant::now(),
			"deployment",
			&Rejects("no remote"),
			&Config::default(),
			None,
		)
		.await;

		assert_eq!(logger.count(Channel::Info), 1);
		assert_eq!(logger.lines().len(), 3);
	}

	#[test]
	fn panicking_callback_still_reports_elapsed() {
		let logger = RecordingLogger::default();
		let rt = tokio::runtime::Builder::new_current_thread()
			.enable_all()
			.build()
			.unwrap();
		let callback: &dyn Fn() = &|| panic!("callback bug");

		let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
			rt.block_on(execute(
				&logger,
				Instant::now(),
				"project initialization",
				&Resolves(Duration::ZERO),
				&Config::default(),
				Some(callback),
			))
		}));

		assert!(result.is_err());
		let messages = logger.messages();
		assert_eq!(messages.len(), 3);
		assert_eq!(messages[1], "Project initialization finished");
		assert!(messages[2].starts_with("Time elapsed: "));
	}

	#[test]
	fn finalizer_reports_pinned_end_time() {
		let logger = RecordingLogger::default();
		let started = Instant::now();
		{
			let mut finalizer =
				Finalizer::new(&logger, started).finished_at(started + Duration::from_millis(5));
			assert_eq!(finalizer.finish(), Duration::from_millis(5));
		}
		assert_eq!(logger.messages(), vec!["Time elapsed: 5 ms".to_string()]);
	}

	#[test]
	fn finalizer_reports_on_drop() {
		let logger = RecordingLogger::default();
		let started = Instant::now();
		drop(Finalizer::new(&logger, started).finished_at(started + Duration::from_secs(90)));
		assert_eq!(logger.messages(), vec!["Time elapsed: 1 minute".to_string()]);
	}

	#[test]
	fn capitalize_touches_only_the_first_character() {
		assert_eq!(capitalize("building"), "Building");
		assert_eq!(capitalize("project initialization"), "Project initialization");
		assert_eq!(capitalize("éclair"), "Éclair");
		assert_eq!(capitalize(""), "");
	}

	#[test]
	fn format_elapsed_picks_largest_unit() {
		assert_eq!(format_elapsed(Duration::from_millis(5)), "5 ms");
		assert_eq!(format_elapsed(Duration::from_millis(999)), "999 ms");
		assert_eq!(format_elapsed(Duration::from_secs(1)), "1 second");
		assert_eq!(format_elapsed(Duration::from_secs(42)), "42 seconds");
		assert_eq!(format_elapsed(Duration::from_secs(7_200)), "2 hours");
		assert_eq!(format_elapsed(Duration::from_secs(200_000)), "2 days");
	}
}
