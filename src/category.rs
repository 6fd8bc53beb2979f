//! # Output Categories
//!
//! The kinds of flake outputs whose attribute names are mirrored into CI
//! matrices. Each category knows the flake output it is read from, the job
//! name fragment used in CI files and the matrix variable the names are
//! stored under.

use std::fmt;

use crate::naming::shout_case;

/// The only system whose packages are listed.
pub const SYSTEM: &str = "x86_64-linux";

/// A group of flake outputs tracked in CI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputCategory {
    /// `packages.<system>`
    Packages,
    /// `nixosConfigurations`
    NixosConfigurations,
    /// `homeConfigurations`
    HomeConfigurations,
}

impl OutputCategory {
    /// All categories, in the order they are processed.
    pub const ALL: [OutputCategory; 3] = [
        OutputCategory::Packages,
        OutputCategory::NixosConfigurations,
        OutputCategory::HomeConfigurations,
    ];

    /// Name of the flake output attribute set.
    pub fn flake_output(self) -> &'static str {
        match self {
            OutputCategory::Packages => "packages",
            OutputCategory::NixosConfigurations => "nixosConfigurations",
            OutputCategory::HomeConfigurations => "homeConfigurations",
        }
    }

    /// Job name fragment: the flake output without its plural `s`.
    pub fn job_suffix(self) -> &'static str {
        let output = self.flake_output();
        output.strip_suffix('s').unwrap_or(output)
    }

    /// Matrix variable holding the attribute names, e.g. `NIXOS_CONFIGURATION`.
    pub fn var_name(self) -> String {
        shout_case(self.job_suffix())
    }

    /// Attribute path below the flake root; packages are qualified with
    /// [`SYSTEM`].
    pub fn attr_path(self) -> String {
        match self {
            OutputCategory::Packages => format!("{}.{}", self.flake_output(), SYSTEM),
            _ => self.flake_output().to_string(),
        }
    }

    /// Installable passed to the evaluator, e.g. `.#packages.x86_64-linux`.
    pub fn selector(self, flake: &str) -> String {
        format!("{}#{}", flake, self.attr_path())
    }
}

impl fmt::Display for OutputCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flake_output())
    }
}
