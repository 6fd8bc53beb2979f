//! # update-ci
//!
//! Binary entry point. Parses the command line, runs the update over the
//! known CI files and turns the result into an exit code:
//!
//! - 0: success, or changes were made without `--check`
//! - 1: `--check` found a changed file, or an external tool failed
//! - 2: invalid command-line usage (handled by clap)
//!
//! The work itself lives in the `update_ci` library crate.

mod cli;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<ExitCode> {
    let cli = cli::Cli::parse();
    cli.execute()
}
