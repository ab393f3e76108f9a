//! Command-line front end for Antwar sites: project scaffolding, theme
//! installation, static builds, local serving and branch deployment.
//!
//! Every command runs through [`runner::execute`], which brackets the
//! operation with start, finish-or-fail and elapsed-time console lines.

pub mod cli;
pub mod config;
pub mod console;
pub mod content;
pub mod deploy;
pub mod generator;
pub mod logging;
pub mod operations;
pub mod paths;
pub mod runner;
pub mod scaffold;
pub mod server;
pub mod templates;
pub mod themes;
