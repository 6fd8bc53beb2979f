//! # File Processing
//!
//! Runs the update over every known CI file, one at a time:
//!
//! 1. Skip the file if it does not exist.
//! 2. Hash its current content.
//! 3. Parse it, apply the [`CiFormat`] strategy, write it back. Changed
//!    matrices are edited into the original text so comments, anchors and
//!    layout survive; the document is only re-serialized as a whole when an
//!    edit cannot be made in place.
//! 4. Run the formatter on it.
//! 5. In check mode, hash it again; if the hash moved, record the change and
//!    print the diff.
//!
//! Any error aborts the whole run. Files already rewritten stay rewritten.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_yaml::Value as YamlValue;

use crate::category::OutputCategory;
use crate::error::{Error, Result};
use crate::evaluator::Evaluator;
use crate::splice;
use crate::strategy::{CiFormat, MatrixUpdate, KNOWN_CI_FILES};
use crate::tools::{content_hash, DiffViewer, Formatter};

/// What happened to one CI file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// Path relative to the working directory
    pub path: PathBuf,
    pub format: CiFormat,
    /// Categories whose matrix was rewritten
    pub updated: Vec<OutputCategory>,
    /// Whether the content hash changed; only known in check mode
    pub changed: Option<bool>,
}

/// Outcome of a run over all known CI files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Files that were present, in processing order
    pub files: Vec<FileReport>,
}

impl RunReport {
    /// True if any file's content changed during a check run.
    pub fn change_detected(&self) -> bool {
        self.files.iter().any(|f| f.changed == Some(true))
    }

    fn record(&mut self, report: FileReport) {
        self.files.push(report);
    }
}

/// Keeps the CI files below one working directory in sync with a flake.
pub struct Synchronizer<'a> {
    working_dir: PathBuf,
    flake: String,
    check: bool,
    evaluator: &'a mut dyn Evaluator,
    formatter: Formatter,
    diff: DiffViewer,
}

impl<'a> Synchronizer<'a> {
    pub fn new(
        working_dir: impl Into<PathBuf>,
        evaluator: &'a mut dyn Evaluator,
        formatter: Formatter,
        diff: DiffViewer,
    ) -> Self {
        Self {
            working_dir: working_dir.into(),
            flake: ".".to_string(),
            check: false,
            evaluator,
            formatter,
            diff,
        }
    }

    /// Flake reference the outputs are read from (default `.`).
    pub fn flake(mut self, flake: impl Into<String>) -> Self {
        self.flake = flake.into();
        self
    }

    /// Enable change detection.
    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    /// Process every known CI file in order, writing diffs of changed files
    /// to `diff_out`.
    pub fn run(&mut self, diff_out: &mut dyn Write) -> Result<RunReport> {
        let mut report = RunReport::default();
        for (path, format) in KNOWN_CI_FILES {
            if let Some(file) = self.process_file(Path::new(path), format, diff_out)? {
                report.record(file);
            }
        }
        Ok(report)
    }

    /// Process a single CI file. Returns `None` if the file does not exist.
    pub fn process_file(
        &mut self,
        path: &Path,
        format: CiFormat,
        diff_out: &mut dyn Write,
    ) -> Result<Option<FileReport>> {
        let full_path = self.working_dir.join(path);
        if !full_path.is_file() {
            return Ok(None);
        }
        info!("processing {}", path.display());

        let hash_before = content_hash(&full_path)?;

        let source = read(&full_path)?;
        let mut doc: YamlValue = serde_yaml::from_str(&source).map_err(|err| Error::Yaml {
            path: full_path.clone(),
            source: err,
        })?;
        let updates = format.apply(&mut doc, &mut *self.evaluator, &self.flake)?;
        let content = render(path, &source, &doc, &updates)?;
        write(&full_path, &content)?;

        self.formatter.format(path)?;

        let changed = if self.check {
            let changed = content_hash(&full_path)? != hash_before;
            if changed {
                info!("{} changed", path.display());
                self.diff.show(path, diff_out);
            }
            Some(changed)
        } else {
            None
        };

        Ok(Some(FileReport {
            path: path.to_path_buf(),
            format,
            updated: updates.iter().map(|update| update.category).collect(),
            changed,
        }))
    }
}

fn read(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn write(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// New content of the file at `path`: `source` with every changed matrix
/// edited in place, or `doc` serialized as a whole if that is not possible.
fn render(path: &Path, source: &str, doc: &YamlValue, updates: &[MatrixUpdate]) -> Result<String> {
    let mut content = source.to_string();
    let mut edited = false;
    for update in updates.iter().filter(|update| update.changed) {
        match splice::replace_value(&content, &update.chain, &update.value) {
            Some(next) => {
                content = next;
                edited = true;
            }
            None => {
                warn!(
                    "cannot edit {} in place in {}; rewriting the whole file",
                    update.chain,
                    path.display()
                );
                return serialize(path, doc);
            }
        }
    }

    if edited && serde_yaml::from_str::<YamlValue>(&content).ok().as_ref() != Some(doc) {
        warn!("in-place edit of {} did not round-trip; rewriting the whole file", path.display());
        return serialize(path, doc);
    }
    Ok(content)
}

fn serialize(path: &Path, doc: &YamlValue) -> Result<String> {
    serde_yaml::to_string(doc).map_err(|source| Error::Yaml {
        path: path.to_path_buf(),
        source,
    })
}
