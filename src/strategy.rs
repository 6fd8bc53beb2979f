//! # CI Update Strategies
//!
//! Each supported CI system stores its build matrix in a different place and
//! shape. This module maps a [`CiFormat`] and an [`OutputCategory`] to the
//! [`KeyChain`] of the matrix field and to the value written there.
//!
//! ## Forgejo / GitHub Actions
//!
//! ```yaml
//! jobs:
//!   build-package:
//!     strategy:
//!       matrix:
//!         PACKAGE: [hello, world]
//! ```
//!
//! ## GitLab CI
//!
//! GitLab's `parallel:matrix` takes a list of variable maps:
//!
//! ```yaml
//! nix:build:package:
//!   parallel:
//!     matrix:
//!       - PACKAGE: [hello, world]
//! ```
//!
//! A job that does not exist in a file is skipped without evaluating its
//! output. Jobs that only get their matrix through a `<<` merge key are
//! skipped as well, with a warning.

use std::path::Path;

use log::{info, warn};
use serde_yaml::{Mapping, Value as YamlValue};

use crate::category::OutputCategory;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::keychain::{update_if_exists, KeyChain};

/// Layout of a CI definition file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiFormat {
    /// Forgejo and GitHub Actions workflows
    Actions,
    /// `.gitlab-ci.yml`
    GitLab,
}

/// CI files that are updated, relative to the repository root, in
/// processing order.
pub const KNOWN_CI_FILES: [(&str, CiFormat); 3] = [
    (".forgejo/workflows/nix.yaml", CiFormat::Actions),
    (".github/workflows/nix.yaml", CiFormat::Actions),
    (".gitlab-ci.yml", CiFormat::GitLab),
];

impl CiFormat {
    /// Format of a known CI file, matched on its path relative to the
    /// repository root.
    pub fn for_path(path: &Path) -> Option<CiFormat> {
        KNOWN_CI_FILES
            .iter()
            .find(|(known, _)| Path::new(known) == path)
            .map(|(_, format)| *format)
    }

    /// Location of the matrix field for `category`.
    pub fn key_chain(self, category: OutputCategory) -> KeyChain {
        let suffix = category.job_suffix();
        match self {
            CiFormat::Actions => KeyChain::new([
                "jobs".to_string(),
                format!("build-{suffix}"),
                "strategy".to_string(),
                "matrix".to_string(),
                category.var_name(),
            ]),
            CiFormat::GitLab => KeyChain::new([
                format!("nix:build:{suffix}"),
                "parallel".to_string(),
                "matrix".to_string(),
            ]),
        }
    }

    /// Value stored at [`CiFormat::key_chain`] for the given attribute names.
    pub fn matrix_value(self, category: OutputCategory, names: Vec<String>) -> YamlValue {
        let names = YamlValue::Sequence(names.into_iter().map(YamlValue::String).collect());
        match self {
            CiFormat::Actions => names,
            CiFormat::GitLab => {
                let mut vars = Mapping::new();
                vars.insert(YamlValue::String(category.var_name()), names);
                YamlValue::Sequence(vec![YamlValue::Mapping(vars)])
            }
        }
    }

    /// Update every category's matrix present in `doc`.
    ///
    /// Categories are handled in [`OutputCategory::ALL`] order and each
    /// present one triggers its own evaluation of `<flake>#<output>`.
    /// Returns one [`MatrixUpdate`] per category that was written.
    pub fn apply(
        self,
        doc: &mut YamlValue,
        evaluator: &mut dyn Evaluator,
        flake: &str,
    ) -> Result<Vec<MatrixUpdate>> {
        let mut updates = Vec::new();
        for category in OutputCategory::ALL {
            let chain = self.key_chain(category);
            let selector = category.selector(flake);
            let previous = chain.resolve(doc).cloned();

            let replaced = update_if_exists(doc, &chain, || {
                let names = evaluator.attr_names(&selector)?;
                Ok(self.matrix_value(category, names))
            })?;

            match chain.resolve(doc) {
                Some(value) if replaced => {
                    let changed = previous.as_ref() != Some(value);
                    updates.push(MatrixUpdate {
                        category,
                        value: value.clone(),
                        chain,
                        changed,
                    });
                }
                _ if chain.stops_at_merge_key(doc) => warn!(
                    "key_chain {} is not present; keys merged in with `<<` are not followed",
                    chain
                ),
                _ => info!("key_chain {} is not present", chain),
            }
        }
        Ok(updates)
    }
}

/// A matrix field written by [`CiFormat::apply`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixUpdate {
    pub category: OutputCategory,
    /// Where the matrix lives in the document
    pub chain: KeyChain,
    /// The value now stored there
    pub value: YamlValue,
    /// False if the evaluation reproduced the value already present
    pub changed: bool,
}
