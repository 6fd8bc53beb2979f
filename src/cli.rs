//! CLI argument parsing and execution

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use update_ci::driver::Synchronizer;
use update_ci::evaluator::NixEvaluator;
use update_ci::tools::{DiffViewer, Formatter, LINE_PREFIX};

/// Updates YAML based CI files with the outputs of a Nix flake
#[derive(Parser, Debug)]
#[command(name = "update-ci")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit a non-zero exit code if a workflow was changed
    #[arg(short, long)]
    pub check: bool,

    /// Be verbose about what is touched in the YAML files
    #[arg(short, long)]
    pub verbose: bool,

    /// Repository root containing the CI files (defaults to the current directory)
    #[arg(long, value_name = "DIR")]
    pub working_dir: Option<PathBuf>,

    /// Flake whose outputs are listed
    #[arg(long, value_name = "REF", default_value = ".")]
    pub flake: String,

    /// Program used to evaluate and format
    #[arg(long, value_name = "PROGRAM", env = "UPDATE_CI_NIX", default_value = "nix")]
    pub nix: String,

    /// Program used to show diffs in check mode
    #[arg(long, value_name = "PROGRAM", env = "UPDATE_CI_GIT", default_value = "git")]
    pub git: String,
}

impl Cli {
    /// Execute the update and map the outcome to an exit code
    pub fn execute(self) -> Result<ExitCode> {
        init_logging(self.verbose);

        let working_dir = match self.working_dir {
            Some(dir) => dir,
            None => std::env::current_dir().context("Failed to get current directory")?,
        };

        let mut evaluator = NixEvaluator::new(&self.nix, &working_dir);
        let mut synchronizer = Synchronizer::new(
            &working_dir,
            &mut evaluator,
            Formatter::new(&self.nix, &working_dir),
            DiffViewer::new(&self.git, &working_dir),
        )
        .flake(self.flake)
        .check(self.check);

        let report = synchronizer.run(&mut std::io::stderr())?;

        if self.check && report.change_detected() {
            return Ok(ExitCode::FAILURE);
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Route log records to stderr when verbose and discard them otherwise.
///
/// `UPDATE_CI_LOG` overrides the level filter.
fn init_logging(verbose: bool) {
    let target = if verbose {
        env_logger::Target::Stderr
    } else {
        env_logger::Target::Pipe(Box::new(std::io::sink()))
    };

    env_logger::Builder::new()
        .filter_level(LevelFilter::Info)
        .parse_env("UPDATE_CI_LOG")
        .format(|buf, record| writeln!(buf, "{}{}", LINE_PREFIX, record.args()))
        .target(target)
        .init();
}
