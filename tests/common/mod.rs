//! Shared test utilities for E2E tests.
//!
//! [`TestFixture`] provides a temporary repository plus fake `nix` and `git`
//! programs. The fake `nix` answers `eval` from canned JSON files and records
//! every `eval` and `fmt` call; the fake `git` prints a one-line diff header.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new()
//!         .with_file(".gitlab-ci.yml", configs::GITLAB)
//!         .with_output("nixosConfigurations", &["desktop"]);
//!     fixture.command().assert().success();
//! }
//! ```

#![cfg(unix)]

use assert_fs::prelude::*;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    pub use super::TestFixture;
}

/// CI file snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// Actions workflow with a package job.
    pub const ACTIONS: &str = r#"
name: nix
on: [push]
jobs:
  build-package:
    runs-on: nix
    strategy:
      fail-fast: false
      matrix:
        PACKAGE: [old]
    steps:
      - run: nix build .#${{ matrix.PACKAGE }}
"#;

    /// Actions workflow with all three build jobs.
    pub const ACTIONS_ALL: &str = r#"
jobs:
  build-package:
    strategy:
      matrix:
        PACKAGE: []
  build-nixosConfiguration:
    strategy:
      matrix:
        NIXOS_CONFIGURATION: []
  build-homeConfiguration:
    strategy:
      matrix:
        HOME_CONFIGURATION: []
"#;

    /// GitLab pipeline with a NixOS job only.
    pub const GITLAB: &str = r#"
stages: [build]
nix:build:nixosConfiguration:
  stage: build
  parallel:
    matrix:
      - NIXOS_CONFIGURATION: [old]
"#;
}

const FAKE_NIX: &str = r#"#!/bin/sh
dir="$(dirname "$0")"
case "$1" in
  eval)
    echo "$5" >> "$dir/eval.log"
    answer="$dir/answers/${5#*#}"
    if [ ! -f "$answer" ]; then
      echo "error: flake does not provide attribute '$5'" >&2
      exit 1
    fi
    cat "$answer"
    ;;
  fmt)
    echo "$2" >> "$dir/fmt.log"
    exit "${FAKE_FMT_EXIT:-0}"
    ;;
  *)
    exit 1
    ;;
esac
"#;

const FAKE_GIT: &str = r#"#!/bin/sh
echo "${3#--line-prefix=}diff --git a/$5 b/$5"
exit 1
"#;

/// A temporary repository with fake external tools.
pub struct TestFixture {
    repo: assert_fs::TempDir,
    tools: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a fixture with an empty repository and no flake outputs.
    pub fn new() -> Self {
        let tools = assert_fs::TempDir::new().expect("Failed to create tools directory");
        tools
            .child("answers")
            .create_dir_all()
            .expect("Failed to create answers directory");
        install_script(tools.path(), "nix", FAKE_NIX);
        install_script(tools.path(), "git", FAKE_GIT);

        Self {
            repo: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            tools,
        }
    }

    /// Add a file to the repository.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.repo
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Make the fake evaluator answer `attr_path` (e.g. `nixosConfigurations`
    /// or `packages.x86_64-linux`) with `names`.
    pub fn with_output(self, attr_path: &str, names: &[&str]) -> Self {
        let json = serde_json::to_string(names).expect("Failed to encode names");
        self.tools
            .child("answers")
            .child(attr_path)
            .write_str(&json)
            .expect("Failed to write answer");
        self
    }

    /// Path to the repository.
    pub fn path(&self) -> &Path {
        self.repo.path()
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.repo.child(path)
    }

    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.repo.path().join(path)).expect("Failed to read file")
    }

    pub fn read_yaml(&self, path: &str) -> serde_yaml::Value {
        serde_yaml::from_str(&self.read(path)).expect("File should be valid YAML")
    }

    /// Selectors the fake evaluator was asked for, in order.
    pub fn evaluations(&self) -> Vec<String> {
        read_lines(&self.tools.path().join("eval.log"))
    }

    /// Files the fake formatter was run on, in order.
    pub fn formatted(&self) -> Vec<String> {
        read_lines(&self.tools.path().join("fmt.log"))
    }

    pub fn nix_path(&self) -> PathBuf {
        self.tools.path().join("nix")
    }

    /// Create a command running in the repository with the fake tools.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("update-ci");
        cmd.current_dir(self.path())
            .env("UPDATE_CI_NIX", self.tools.path().join("nix"))
            .env("UPDATE_CI_GIT", self.tools.path().join("git"))
            .env_remove("UPDATE_CI_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn install_script(dir: &Path, name: &str, body: &str) {
    let path = dir.join(name);
    std::fs::write(&path, body).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to make script executable");
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .map(|s| s.lines().map(str::to_string).collect())
        .unwrap_or_default()
}
