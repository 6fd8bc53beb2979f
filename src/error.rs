//! # Error Handling
//!
//! This module defines the centralized error type for `update-ci`. It uses
//! the `thiserror` library to describe every failure that aborts a run.
//!
//! All of these are environment failures: a missing or misbehaving external
//! tool, an unreadable file, or a CI file that is not valid YAML. A job that
//! is absent from a CI file is *not* an error and never surfaces here.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for update-ci operations
#[derive(Error, Debug)]
pub enum Error {
    /// A CI file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CI file is not valid YAML, or the updated document could not be
    /// serialized again.
    #[error("YAML error in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An external program could not be started at all.
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The build-graph evaluator exited with a non-zero status.
    #[error("Evaluation of {selector} failed ({status}){}", if stderr.is_empty() { String::new() } else { format!(": {}", stderr.trim_end()) })]
    Evaluation {
        selector: String,
        status: String,
        stderr: String,
    },

    /// The build-graph evaluator succeeded but its output was not a JSON
    /// array of strings.
    #[error("Evaluation of {selector} returned invalid JSON: {source}")]
    EvaluationOutput {
        selector: String,
        #[source]
        source: serde_json::Error,
    },

    /// The formatter exited with a non-zero status.
    #[error("Formatting {} failed ({status})", path.display())]
    Format { path: PathBuf, status: String },
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
