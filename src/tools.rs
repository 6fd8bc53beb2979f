//! External tools run after a CI file is rewritten, and the content hash
//! used to notice whether anything changed.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::{debug, warn};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Prefix put in front of every log line and every line of diff output.
pub const LINE_PREFIX: &str = "      ";

/// SHA-256 of a file's bytes as lowercase hex.
pub fn content_hash(path: &Path) -> Result<String> {
    let content = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Runs `<program> fmt <file>` to normalize a rewritten file.
#[derive(Debug, Clone)]
pub struct Formatter {
    program: String,
    working_dir: PathBuf,
}

impl Formatter {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Format `path` in place. The formatter's own output is passed through.
    pub fn format(&self, path: &Path) -> Result<()> {
        debug!("running {} fmt {}", self.program, path.display());
        let status = Command::new(&self.program)
            .arg("fmt")
            .arg(path)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .status()
            .map_err(|source| Error::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(Error::Format {
                path: path.to_path_buf(),
                status: status.to_string(),
            });
        }
        Ok(())
    }
}

/// Shows the working-tree diff of a changed file through git.
#[derive(Debug, Clone)]
pub struct DiffViewer {
    program: String,
    working_dir: PathBuf,
}

impl DiffViewer {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    /// Write the diff of `path`, each line prefixed with [`LINE_PREFIX`], to
    /// `out`. Failures of the diff tool are logged and otherwise ignored.
    pub fn show(&self, path: &Path, out: &mut dyn Write) {
        let output = Command::new(&self.program)
            .arg("--no-pager")
            .arg("diff")
            .arg(format!("--line-prefix={LINE_PREFIX}"))
            .arg("--")
            .arg(path)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output();

        match output {
            Ok(output) => {
                if !output.status.success() {
                    debug!("{} diff exited with {}", self.program, output.status);
                }
                if let Err(e) = out.write_all(&output.stdout) {
                    warn!("could not write diff of {}: {}", path.display(), e);
                }
            }
            Err(e) => warn!("could not run {} diff: {}", self.program, e),
        }
    }
}
