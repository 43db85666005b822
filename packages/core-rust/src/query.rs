//! Query descriptors and their deterministic cache keys.
//!
//! A [`QueryDescriptor`] names one logical fetch: a category such as
//! `"explore/trending"` plus primitive parameters. Parameters live in a
//! `BTreeMap`, so the derived [`QueryKey`] is identical for equal descriptors
//! regardless of the order parameters were added in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Primitive parameter value carried by a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Explicit null.
    Null,
    /// Boolean flag.
    Bool(bool),
    /// Signed integer (limits, page sizes, ids).
    Int(i64),
    /// Floating-point number.
    Float(f64),
    /// UTF-8 string (search text, slugs).
    Str(String),
}

impl ParamValue {
    /// Renders the value for use in a URL query string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Str(s) => s.clone(),
        }
    }

    /// Returns the integer payload, if this is an `Int`.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the string payload, if this is a `Str`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u64> for ParamValue {
    fn from(value: u64) -> Self {
        Self::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// Identifies one logical fetch. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDescriptor {
    category: String,
    params: BTreeMap<String, ParamValue>,
}

impl QueryDescriptor {
    /// Creates a descriptor with no parameters.
    #[must_use]
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            params: BTreeMap::new(),
        }
    }

    /// Returns a copy of this descriptor with one more parameter.
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Category name, e.g. `"explore/upcoming"`.
    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }

    /// All parameters in key order.
    #[must_use]
    pub fn params(&self) -> &BTreeMap<String, ParamValue> {
        &self.params
    }

    /// Looks up a single parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    /// True when the category equals `prefix` or lives beneath it
    /// (`"me"` matches `"me/playlists"` but not `"media"`).
    #[must_use]
    pub fn in_category(&self, prefix: &str) -> bool {
        self.category == prefix
            || self
                .category
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Deterministic cache key for this descriptor.
    #[must_use]
    pub fn key(&self) -> QueryKey {
        // BTreeMap serialization is ordered, and primitive values cannot fail to encode.
        let params = serde_json::to_string(&self.params).unwrap_or_default();
        QueryKey(format!("{}?{}", self.category, params))
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key().0)
    }
}

/// Serialized form of a [`QueryDescriptor`], used as the cache map key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryKey(String);

impl QueryKey {
    /// The raw key text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn same_params_same_key_regardless_of_order() {
        let a = QueryDescriptor::new("explore/trending")
            .with_param("limit", 20_u32)
            .with_param("platform", "pc");
        let b = QueryDescriptor::new("explore/trending")
            .with_param("platform", "pc")
            .with_param("limit", 20_u32);
        assert_eq!(a.key(), b.key());
        assert_eq!(a, b);
    }

    #[test]
    fn limit_changes_key() {
        let a = QueryDescriptor::new("explore/trending").with_param("limit", 20_u32);
        let b = QueryDescriptor::new("explore/trending").with_param("limit", 40_u32);
        assert_ne!(a.key(), b.key());
    }

    #[test]
    fn category_prefix_matching() {
        let d = QueryDescriptor::new("me/playlists");
        assert!(d.in_category("me"));
        assert!(d.in_category("me/playlists"));
        assert!(!QueryDescriptor::new("media").in_category("me"));
    }

    #[test]
    fn query_string_rendering() {
        assert_eq!(ParamValue::from(5_u32).to_query_string(), "5");
        assert_eq!(ParamValue::from("zelda").to_query_string(), "zelda");
        assert_eq!(ParamValue::Null.to_query_string(), "");
    }

    proptest! {
        #[test]
        fn key_is_independent_of_insertion_order(
            entries in proptest::collection::btree_map("[a-z]{1,6}", any::<i64>(), 0..8)
        ) {
            let forward = entries
                .iter()
                .fold(QueryDescriptor::new("cat"), |d, (k, v)| d.with_param(k.clone(), *v));
            let backward = entries
                .iter()
                .rev()
                .fold(QueryDescriptor::new("cat"), |d, (k, v)| d.with_param(k.clone(), *v));
            prop_assert_eq!(forward.key(), backward.key());
        }

        #[test]
        fn distinct_categories_never_collide(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            prop_assume!(a != b);
            prop_assert_ne!(QueryDescriptor::new(a).key(), QueryDescriptor::new(b).key());
        }
    }
}
