//! Cluster hash slot computation.
//!
//! Redis Cluster partitions the keyspace into 16384 slots using CRC16
//! (XMODEM) of the key, or of its hash tag when one is present. Computing
//! slots locally lets batch reads be rejected before any network call.

use stowage_core::{StoreError, StowageResult};

/// Number of hash slots in a Redis Cluster.
pub const SLOT_COUNT: u16 = 16384;

/// CRC16-CCITT (XMODEM): polynomial 0x1021, initial value 0.
fn crc16(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// The portion of `key` that determines its slot.
///
/// The hash tag is the content between the first `{` and the next `}`,
/// provided it is non-empty; otherwise the whole key is hashed.
pub fn hash_tag(key: &[u8]) -> &[u8] {
    if let Some(open) = key.iter().position(|&b| b == b'{') {
        let rest = &key[open + 1..];
        if let Some(len) = rest.iter().position(|&b| b == b'}') {
            if len > 0 {
                return &rest[..len];
            }
        }
    }
    key
}

/// Hash slot owning `key`.
pub fn key_slot(key: &str) -> u16 {
    crc16(hash_tag(key.as_bytes())) % SLOT_COUNT
}

/// Ensure every key in a batch lives in the same slot.
///
/// Returns the shared slot, `None` for an empty batch, or
/// `StoreError::CrossShard` naming the whole batch.
pub fn same_slot(keys: &[String]) -> StowageResult<Option<u16>> {
    let mut iter = keys.iter();
    let first = match iter.next() {
        Some(key) => key_slot(key),
        None => return Ok(None),
    };

    if iter.any(|key| key_slot(key) != first) {
        return Err(StoreError::CrossShard {
            keys: keys.to_vec(),
        }
        .into());
    }

    Ok(Some(first))
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn prop_slot_in_range(key in ".*") {
            prop_assert!(key_slot(&key) < SLOT_COUNT);
        }

        /// Keys sharing a non-empty hash tag always share a slot.
        #[test]
        fn prop_tag_pins_slot(tag in "[a-z0-9]{1,8}", a in "[^{]*", b in "[^{]*") {
            let left = format!("{{{}}}{}", tag, a);
            let right = format!("{{{}}}{}", tag, b);
            prop_assert_eq!(key_slot(&left), key_slot(&right));
        }
    }
}
