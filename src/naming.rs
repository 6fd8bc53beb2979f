//! Identifier case conversion for matrix variable names.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static UPPERCASE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("[A-Z]").expect("uppercase pattern is valid"));

/// Convert a camelCase identifier into SHOUT_CASE.
///
/// An underscore is inserted before every uppercase letter that is not the
/// first character, then the whole string is uppercased. Nothing else is
/// special-cased: digits and existing underscores pass through unchanged, and
/// runs of capitals get one separator per letter.
///
/// ```
/// use update_ci::naming::shout_case;
///
/// assert_eq!(shout_case("nixosConfiguration"), "NIXOS_CONFIGURATION");
/// assert_eq!(shout_case("package"), "PACKAGE");
/// ```
pub fn shout_case(input: &str) -> String {
    UPPERCASE
        .replace_all(input, |caps: &Captures| match caps.get(0) {
            Some(m) if m.start() > 0 => format!("_{}", m.as_str()),
            Some(m) => m.as_str().to_string(),
            None => String::new(),
        })
        .to_uppercase()
}
