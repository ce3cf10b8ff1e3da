//! Fuzz test for key normalization
//!
//! Feeds arbitrary raw keys and namespaces through `normalize` and checks
//! that it never panics and never stacks prefixes.
//!
//! Run with: cargo +nightly fuzz run normalize_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use stowage_core::{normalize, strip_namespace, CacheKey, SEPARATOR};

fuzz_target!(|data: (&str, &str)| {
    let (raw, namespace) = data;
    let key = normalize(raw, namespace);

    if namespace.is_empty() {
        assert_eq!(key, strip_namespace(raw));
    } else {
        assert!(key.starts_with(namespace));
        assert_eq!(&key[namespace.len()..][..1], SEPARATOR.to_string());
        assert!(key.ends_with(strip_namespace(raw)));

        if !namespace.contains(SEPARATOR) {
            assert_eq!(normalize(&key, namespace), key);
        }
    }

    assert_eq!(CacheKey::new(raw, namespace).as_str(), key);
});
