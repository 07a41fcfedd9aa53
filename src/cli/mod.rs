//! Command-line interface for buildfix.
//!
//! Provides the `run` repair loop plus the standalone `extract` and `apply`
//! stages for working with saved build logs and fix plans.

mod commands;

pub use commands::{parse_cli, run, run_with_cli, Cli, Commands};
