//! Developer diagnostics.
//!
//! Console lines that users see go through [`crate::console::Logger`]; this
//! module only wires `tracing` events, filtered by `RUST_LOG` and written to
//! stderr.
//!
//! ```bash
//! RUST_LOG=antwar=debug antwar --build
//! ```

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Defaults to `warn` when `RUST_LOG` is unset.
pub fn init() {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt::layer().with_writer(std::io::stderr).compact())
		.init();
}
