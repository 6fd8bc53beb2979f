//! # update-ci
//!
//! Keeps the build matrices of CI workflow files in sync with the outputs a
//! Nix flake actually provides. For each known CI file the library lists the
//! attribute names of a few flake outputs (packages, NixOS configurations,
//! home configurations) and writes them into the matrix of the matching job.
//!
//! ## Quick Example
//!
//! ```
//! use update_ci::category::OutputCategory;
//! use update_ci::keychain::{update_if_exists, KeyChain};
//! use update_ci::strategy::CiFormat;
//!
//! let mut doc: serde_yaml::Value = serde_yaml::from_str(
//!     "jobs:\n  build-package:\n    strategy:\n      matrix:\n        PACKAGE: [old]\n",
//! )
//! .unwrap();
//!
//! let chain = CiFormat::Actions.key_chain(OutputCategory::Packages);
//! assert_eq!(
//!     chain,
//!     KeyChain::new(["jobs", "build-package", "strategy", "matrix", "PACKAGE"])
//! );
//!
//! let updated = update_if_exists(&mut doc, &chain, || Ok(vec!["hello"].into())).unwrap();
//! assert!(updated);
//! ```
//!
//! ## Core Concepts
//!
//! - **Output categories (`category`)**: which flake outputs are mirrored and
//!   how their job and matrix variable names are derived.
//! - **Key chains (`keychain`)**: fixed paths into a YAML document that are
//!   followed, never created.
//! - **Strategies (`strategy`)**: where Actions-style and GitLab-style files
//!   keep their matrices, and the table of known CI files.
//! - **Evaluator (`evaluator`)**: lists flake attribute names via `nix eval`.
//! - **Splicing (`splice`)**: writes changed values into the original YAML
//!   text so comments and anchors survive.
//! - **Driver (`driver`)**: processes the known files one by one, formats
//!   them and reports whether they changed.

pub mod category;
pub mod driver;
pub mod error;
pub mod evaluator;
pub mod keychain;
pub mod naming;
pub mod splice;
pub mod strategy;
pub mod tools;
