use anyhow::Result;
use clap::Parser;
use std::time::Instant;

use antwar::cli::Cli;
use antwar::logging;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
	let started = Instant::now();
	logging::init();

	let cli = Cli::parse();
	cli.run(started).await?;
	Ok(())
}
