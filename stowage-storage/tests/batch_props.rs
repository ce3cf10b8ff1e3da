//! Property tests for batch reads over generated keys.

use proptest::prelude::*;
use stowage_core::normalize;
use stowage_storage::{key_slot, same_slot, CacheStore, InMemoryStore, RedisClusterStore};
use stowage_test_utils::generators::{arb_namespace, arb_payload, arb_raw_key, arb_tagged_key};
use stowage_test_utils::FakeConnection;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Keys sharing a hash tag always form a valid cluster batch.
    #[test]
    fn prop_tagged_batch_is_accepted(keys in prop::collection::vec(arb_tagged_key("x"), 1..8)) {
        let slot = same_slot(&keys).unwrap();
        prop_assert_eq!(slot, Some(key_slot("x")));

        let conn = FakeConnection::cluster();
        let store = RedisClusterStore::new(conn.clone());
        let values = runtime().block_on(store.read_multi(&keys)).unwrap();

        for key in &keys {
            prop_assert_eq!(values.get(key), Some(&None));
        }
        prop_assert_eq!(conn.calls().mget, 1);
    }

    /// Normalized keys written to a store read back unchanged.
    #[test]
    fn prop_normalized_write_read(
        raw in arb_raw_key(),
        namespace in arb_namespace(),
        payload in arb_payload(),
    ) {
        let store = InMemoryStore::new();
        let key = normalize(&raw, &namespace);

        let rt = runtime();
        rt.block_on(store.write(&key, &payload, std::time::Duration::ZERO)).unwrap();
        let again = normalize(&key, &namespace);
        prop_assert_eq!(rt.block_on(store.read(&again)).unwrap(), payload);
    }
}
