//! Build-graph queries.
//!
//! The attribute names below a flake output are listed by running
//! `nix eval --json --apply builtins.attrNames <selector>`. The query sits
//! behind the [`Evaluator`] trait so the update logic can be driven without
//! a Nix installation.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{Error, Result};

/// Expression applied to the selected output to list its attribute names.
pub const NAME_LISTER: &str = "builtins.attrNames";

/// Lists the attribute names found under a build-graph selector.
pub trait Evaluator {
    /// Evaluate `selector` and return the names of its attributes.
    ///
    /// Every call performs a fresh evaluation; results are not cached.
    fn attr_names(&mut self, selector: &str) -> Result<Vec<String>>;
}

/// [`Evaluator`] backed by the `nix` command line.
#[derive(Debug, Clone)]
pub struct NixEvaluator {
    program: String,
    working_dir: PathBuf,
}

impl NixEvaluator {
    /// Create an evaluator that runs `program` inside `working_dir`.
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }
}

impl Evaluator for NixEvaluator {
    fn attr_names(&mut self, selector: &str) -> Result<Vec<String>> {
        debug!("evaluating {}", selector);
        let output = Command::new(&self.program)
            .args(["eval", "--json", "--apply", NAME_LISTER, selector])
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(Error::Evaluation {
                selector: selector.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        parse_attr_names(selector, &output.stdout)
    }
}

/// Decode evaluator output, which must be a JSON array of strings.
pub fn parse_attr_names(selector: &str, stdout: &[u8]) -> Result<Vec<String>> {
    serde_json::from_slice(stdout).map_err(|source| Error::EvaluationOutput {
        selector: selector.to_string(),
        source,
    })
}
