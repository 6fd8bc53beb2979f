//! Key chains: fixed paths into a YAML document.
//!
//! A [`KeyChain`] names the location of a matrix value inside a CI file, for
//! example `jobs -> build-package -> strategy -> matrix -> PACKAGE`. The
//! chain is only ever followed, never created: [`update_if_exists`] replaces
//! the value at the end of the chain when every step resolves and leaves the
//! document untouched otherwise.

use std::fmt;

use log::info;
use serde_yaml::Value as YamlValue;

use crate::error::Result;

/// A single step in a [`KeyChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathSegment {
    /// A named key for accessing mapping members
    Key(String),
    /// A numeric index for accessing sequence elements
    Index(usize),
}

impl PathSegment {
    /// Look up this segment in `value`.
    ///
    /// Returns `None` both when the key or index is missing and when `value`
    /// is not a container of the right kind. Merge keys (`<<`) are not
    /// followed.
    fn lookup<'a>(&self, value: &'a YamlValue) -> Option<&'a YamlValue> {
        match (self, value) {
            (PathSegment::Key(key), YamlValue::Mapping(map)) => map.get(key.as_str()),
            (PathSegment::Index(idx), YamlValue::Sequence(seq)) => seq.get(*idx),
            _ => None,
        }
    }

    fn lookup_mut<'a>(&self, value: &'a mut YamlValue) -> Option<&'a mut YamlValue> {
        match (self, value) {
            (PathSegment::Key(key), YamlValue::Mapping(map)) => map.get_mut(key.as_str()),
            (PathSegment::Index(idx), YamlValue::Sequence(seq)) => seq.get_mut(*idx),
            _ => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(idx: usize) -> Self {
        PathSegment::Index(idx)
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{:?}", key),
            PathSegment::Index(idx) => write!(f, "{}", idx),
        }
    }
}

/// Ordered path of keys and indices into a document.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct KeyChain(Vec<PathSegment>);

impl KeyChain {
    /// Build a chain from anything convertible to path segments.
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// The segments of this chain, outermost first.
    pub fn segments(&self) -> &[PathSegment] {
        &self.0
    }

    /// Follow the chain to the value it names, if every step resolves.
    pub fn resolve<'a>(&self, doc: &'a YamlValue) -> Option<&'a YamlValue> {
        let mut current = doc;
        for segment in &self.0 {
            current = segment.lookup(current)?;
        }
        Some(current)
    }

    /// Mutable variant of [`KeyChain::resolve`].
    pub fn resolve_mut<'a>(&self, doc: &'a mut YamlValue) -> Option<&'a mut YamlValue> {
        let mut current = doc;
        for segment in &self.0 {
            current = segment.lookup_mut(current)?;
        }
        Some(current)
    }

    /// True if the chain breaks off at a mapping that carries a `<<` merge
    /// key, i.e. the missing key may only be present through the merge.
    pub fn stops_at_merge_key(&self, doc: &YamlValue) -> bool {
        let mut current = doc;
        for segment in &self.0 {
            match segment.lookup(current) {
                Some(next) => current = next,
                None => {
                    return current
                        .as_mapping()
                        .is_some_and(|map| map.contains_key("<<"))
                }
            }
        }
        false
    }
}

impl fmt::Display for KeyChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", segment)?;
        }
        f.write_str("]")
    }
}

/// Replace the value at the end of `chain` with the result of `new_value`.
///
/// `new_value` is called at most once, and only after the whole chain has
/// resolved, so an absent job never costs an evaluation. Returns `Ok(true)`
/// if the value was replaced and `Ok(false)` if any step of the chain (or
/// the chain itself) is empty or missing. Errors from `new_value` are passed
/// through with the document unchanged.
pub fn update_if_exists<F>(doc: &mut YamlValue, chain: &KeyChain, new_value: F) -> Result<bool>
where
    F: FnOnce() -> Result<YamlValue>,
{
    if chain.segments().is_empty() {
        return Ok(false);
    }
    let Some(slot) = chain.resolve_mut(doc) else {
        return Ok(false);
    };

    info!("updating value of {}", chain);
    *slot = new_value()?;
    Ok(true)
}
