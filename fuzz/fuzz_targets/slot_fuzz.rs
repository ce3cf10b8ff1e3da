//! Fuzz test for cluster slot hashing
//!
//! Run with: cargo +nightly fuzz run slot_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use stowage_storage::{hash_tag, key_slot, same_slot, SLOT_COUNT};

fuzz_target!(|data: (&str, &str)| {
    let (a, b) = data;

    // Slots always land inside the keyspace.
    assert!(key_slot(a) < SLOT_COUNT);

    // A hash tag is a substring of the key it came from.
    let tag = hash_tag(a.as_bytes());
    assert!(tag.is_empty() || a.as_bytes().windows(tag.len()).any(|w| w == tag));

    // Keys sharing a tag always share a slot.
    let tagged = vec![format!("{{{}}}.{}", b, a), format!("{{{}}}", b)];
    if !b.is_empty() && !b.contains('}') {
        assert!(same_slot(&tagged).is_ok());
    }
});
