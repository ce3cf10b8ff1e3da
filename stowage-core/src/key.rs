//! Namespaced cache keys.
//!
//! A cache key is a raw identifier optionally prefixed by a single namespace
//! segment: `namespace:identifier`. Normalizing strips any namespace the raw
//! key already carries before applying the requested one, so prefixes are
//! replaced rather than stacked.

use std::fmt;

/// Separator between the namespace and the identifier.
pub const SEPARATOR: char = ':';

/// Canonicalize `raw_key` under `namespace`.
///
/// Everything up to and including the first separator in `raw_key` is
/// dropped; the remainder may itself contain separators. An empty namespace
/// yields the bare identifier.
pub fn normalize(raw_key: &str, namespace: &str) -> String {
    let bare = strip_namespace(raw_key);

    if namespace.is_empty() {
        return bare.to_string();
    }

    let mut key = String::with_capacity(namespace.len() + 1 + bare.len());
    key.push_str(namespace);
    key.push(SEPARATOR);
    key.push_str(bare);
    key
}

/// Return the identifier with its leading namespace segment removed.
pub fn strip_namespace(raw_key: &str) -> &str {
    match raw_key.split_once(SEPARATOR) {
        Some((_, bare)) => bare,
        None => raw_key,
    }
}

/// A normalized cache key.
///
/// Only constructible through normalization, so every `CacheKey` carries at
/// most one namespace segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    inner: String,
    namespace_len: usize,
}

impl CacheKey {
    /// Normalize `raw_key` under `namespace`.
    pub fn new(raw_key: &str, namespace: &str) -> Self {
        Self {
            inner: normalize(raw_key, namespace),
            namespace_len: namespace.len(),
        }
    }

    /// The full key as stored.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// The namespace segment, empty when the key is unprefixed.
    pub fn namespace(&self) -> &str {
        &self.inner[..self.namespace_len]
    }

    /// The identifier without its namespace.
    pub fn identifier(&self) -> &str {
        if self.namespace_len == 0 {
            &self.inner
        } else {
            &self.inner[self.namespace_len + SEPARATOR.len_utf8()..]
        }
    }

    pub fn into_string(self) -> String {
        self.inner
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<CacheKey> for String {
    fn from(key: CacheKey) -> Self {
        key.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_table() {
        let data = ["foo/bar", "api:foo/bar", "bar:foo/bar"];

        for raw in data {
            assert_eq!(normalize(raw, ""), "foo/bar");
            assert_eq!(normalize(raw, "api"), "api:foo/bar");
            assert_eq!(normalize(raw, "foo"), "foo:foo/bar");
        }
    }

    #[test]
    fn test_strips_only_first_separator() {
        assert_eq!(normalize("a:b:c", ""), "b:c");
        assert_eq!(normalize("a:b:c", "api"), "api:b:c");
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(normalize("", ""), "");
        assert_eq!(normalize("", "api"), "api:");
        assert_eq!(normalize(":", "api"), "api:");
    }

    #[test]
    fn test_cache_key_parts() {
        let key = CacheKey::new("old:zoo", "api");
        assert_eq!(key.as_str(), "api:zoo");
        assert_eq!(key.namespace(), "api");
        assert_eq!(key.identifier(), "zoo");
        assert_eq!(key.to_string(), "api:zoo");

        let bare = CacheKey::new("old:zoo", "");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.identifier(), "zoo");
        assert_eq!(String::from(bare), "zoo");
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Namespaces never contain the separator themselves.
    fn namespace_strategy() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,12}"
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Normalizing twice under the same namespace is a no-op.
        #[test]
        fn prop_normalize_idempotent(raw in ".*", namespace in namespace_strategy()) {
            let once = normalize(&raw, &namespace);
            let twice = normalize(&once, &namespace);
            prop_assert_eq!(once, twice);
        }

        /// Without a namespace the result is stable once no separator remains.
        #[test]
        fn prop_unprefixed_idempotent(ident in "[^:]*", prefix in "[^:]*") {
            let raw = format!("{}:{}", prefix, ident);
            let once = normalize(&raw, "");
            prop_assert_eq!(&once, &ident);
            prop_assert_eq!(normalize(&once, ""), ident);
        }

        /// A new namespace replaces the old one instead of stacking.
        #[test]
        fn prop_prefix_replaced(
            ident in "[^:]*",
            old in namespace_strategy(),
            new in namespace_strategy(),
        ) {
            let raw = format!("{}:{}", old, ident);
            let key = normalize(&raw, &new);
            prop_assert_eq!(key.matches(SEPARATOR).count(), 1);
            prop_assert_eq!(key, format!("{}:{}", new, ident));
        }

        #[test]
        fn prop_cache_key_matches_normalize(raw in ".*", namespace in namespace_strategy()) {
            let key = CacheKey::new(&raw, &namespace);
            prop_assert_eq!(key.as_str(), normalize(&raw, &namespace));
            prop_assert_eq!(key.namespace(), namespace.as_str());
        }
    }
}
