//! Stowage Test Utilities
//!
//! Shared test infrastructure for the stowage workspace:
//! - A fake driver connection that counts commands and injects failures
//! - A recording metrics sink
//! - Fixture data used across store and provider tests
//! - Proptest generators for keys and namespaces

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;

pub use stowage_core::{StoreError, StowageError, StowageResult};
pub use stowage_storage::{
    key_slot, CacheStore, DriverError, DriverResult, InMemoryStore, KvConnection, MetricsSink,
};

// ============================================================================
// FAKE DRIVER CONNECTION
// ============================================================================

/// Per-command call counts recorded by [`FakeConnection`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub get: usize,
    pub mget: usize,
    pub set: usize,
    pub incr: usize,
    pub expire: usize,
}

impl CallCounts {
    pub fn total(&self) -> usize {
        self.get + self.mget + self.set + self.incr + self.expire
    }
}

#[derive(Debug)]
struct Slot {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct FakeState {
    data: Mutex<HashMap<String, Slot>>,
    failure: Mutex<Option<DriverError>>,
    native_cross_slot: bool,
    get: AtomicUsize,
    mget: AtomicUsize,
    set: AtomicUsize,
    incr: AtomicUsize,
    expire: AtomicUsize,
}

/// In-process stand-in for a Redis connection.
///
/// Clones share state, so a test can keep a handle after moving one into a
/// store and inspect what reached the "server".
#[derive(Debug, Clone, Default)]
pub struct FakeConnection {
    state: Arc<FakeState>,
}

impl FakeConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection that rejects multi-key commands spanning several slots,
    /// the way a cluster node does.
    pub fn cluster() -> Self {
        Self {
            state: Arc::new(FakeState {
                native_cross_slot: true,
                ..FakeState::default()
            }),
        }
    }

    /// A connection on which every command fails with `err`.
    pub fn failing(err: DriverError) -> Self {
        let conn = Self::new();
        conn.fail_with(Some(err));
        conn
    }

    /// Set or clear the injected failure.
    pub fn fail_with(&self, err: Option<DriverError>) {
        *lock(&self.state.failure) = err;
    }

    /// Seed a persistent value.
    pub fn seed(&self, key: impl Into<String>, value: impl AsRef<[u8]>) {
        lock(&self.state.data).insert(
            key.into(),
            Slot {
                value: value.as_ref().to_vec(),
                expires_at: None,
            },
        );
    }

    /// Live value stored under `key`.
    pub fn value(&self, key: &str) -> Option<Vec<u8>> {
        let now = Instant::now();
        lock(&self.state.data)
            .get(key)
            .filter(|s| s.is_live(now))
            .map(|s| s.value.clone())
    }

    /// Remaining time to live; `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        lock(&self.state.data)
            .get(key)
            .filter(|s| s.is_live(now))
            .and_then(|s| s.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    pub fn calls(&self) -> CallCounts {
        CallCounts {
            get: self.state.get.load(Ordering::SeqCst),
            mget: self.state.mget.load(Ordering::SeqCst),
            set: self.state.set.load(Ordering::SeqCst),
            incr: self.state.incr.load(Ordering::SeqCst),
            expire: self.state.expire.load(Ordering::SeqCst),
        }
    }

    pub fn total_calls(&self) -> usize {
        self.calls().total()
    }

    fn begin(&self, counter: &AtomicUsize) -> DriverResult<()> {
        counter.fetch_add(1, Ordering::SeqCst);
        match lock(&self.state.failure).as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|err| err.into_inner())
}

#[async_trait]
impl KvConnection for FakeConnection {
    async fn get(&self, key: &str) -> DriverResult<Option<Vec<u8>>> {
        self.begin(&self.state.get)?;
        Ok(self.value(key))
    }

    async fn mget(&self, keys: &[String]) -> DriverResult<Vec<Option<Vec<u8>>>> {
        self.begin(&self.state.mget)?;
        if self.state.native_cross_slot {
            let mut slots = keys.iter().map(|k| key_slot(k));
            if let Some(first) = slots.next() {
                if slots.any(|s| s != first) {
                    return Err(DriverError::CrossSlot(
                        "Keys in request don't hash to the same slot".to_string(),
                    ));
                }
            }
        }
        Ok(keys.iter().map(|k| self.value(k)).collect())
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> DriverResult<()> {
        self.begin(&self.state.set)?;
        lock(&self.state.data).insert(
            key.to_string(),
            Slot {
                value: value.to_vec(),
                expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> DriverResult<i64> {
        self.begin(&self.state.incr)?;
        let now = Instant::now();
        let mut data = lock(&self.state.data);
        let (current, expires_at) = match data.get(key).filter(|s| s.is_live(now)) {
            Some(slot) => {
                let n = std::str::from_utf8(&slot.value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| {
                        DriverError::Transport(
                            "ERR value is not an integer or out of range".to_string(),
                        )
                    })?;
                (n, slot.expires_at)
            }
            None => (0, None),
        };
        let next = current + 1;
        data.insert(
            key.to_string(),
            Slot {
                value: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> DriverResult<bool> {
        self.begin(&self.state.expire)?;
        let now = Instant::now();
        let mut data = lock(&self.state.data);
        match data.get_mut(key).filter(|s| s.is_live(now)) {
            Some(slot) => {
                slot.expires_at = now.checked_add(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// RECORDING METRICS SINK
// ============================================================================

/// One latency observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub backend: String,
    pub action: String,
    pub elapsed: Duration,
}

/// [`MetricsSink`] that keeps every observation in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    seen: Mutex<Vec<Observation>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn observations(&self) -> Vec<Observation> {
        lock(&self.seen).clone()
    }

    /// `(backend, action)` pairs in recording order.
    pub fn labels(&self) -> Vec<(String, String)> {
        lock(&self.seen)
            .iter()
            .map(|o| (o.backend.clone(), o.action.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.seen).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl MetricsSink for RecordingSink {
    fn observe(&self, backend: &str, action: &str, elapsed: Duration) {
        lock(&self.seen).push(Observation {
            backend: backend.to_string(),
            action: action.to_string(),
            elapsed,
        });
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixture data shared by store and provider tests.

    use super::*;

    /// Entries every store fixture starts with.
    pub const STORE_FIXTURES: &[(&str, &str)] = &[
        ("foo", r#"{"foo":"bar"}"#),
        ("fox", r#"{"fox":"baz"}"#),
        ("{x}.foo", r#"{"foo":"bar"}"#),
        ("{x}.fox", r#"{"fox":"baz"}"#),
        ("baz", "x"),
    ];

    /// Entries for provider tests, including one already namespaced key.
    pub const PROVIDER_FIXTURES: &[(&str, &str)] = &[
        ("foo", r#"{"foo":"bar"}"#),
        ("fox", r#"{"fox":"baz"}"#),
        ("api:foo", r#"{"foo":"bar"}"#),
        ("baz", "x"),
    ];

    /// Origin payloads served by test origins, keyed by path.
    pub const ORIGIN_PAYLOADS: &[(&str, &str)] = &[("/zoo", r#"{"zoo":"zac"}"#), ("/zab", "remote-x")];

    /// Seed a fake connection with [`STORE_FIXTURES`].
    pub fn load_fixtures(conn: &FakeConnection) {
        for (key, value) in STORE_FIXTURES {
            conn.seed(*key, value.as_bytes());
        }
    }

    /// In-memory store seeded with [`PROVIDER_FIXTURES`].
    pub fn provider_store() -> InMemoryStore {
        let store = InMemoryStore::named("cache/reader");
        for (key, value) in PROVIDER_FIXTURES {
            store.insert(*key, value.as_bytes());
        }
        store
    }

    /// Parse a fixture payload as JSON.
    pub fn json(bytes: &[u8]) -> serde_json::Value {
        serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for keys and namespaces.

    use proptest::prelude::*;

    /// Namespace without the separator.
    pub fn arb_namespace() -> impl Strategy<Value = String> {
        "[a-z0-9_-]{1,12}"
    }

    /// Bare identifier, no separator.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9/._-]{1,32}"
    }

    /// Raw key, optionally carrying a prefix.
    pub fn arb_raw_key() -> impl Strategy<Value = String> {
        (proptest::option::of(arb_namespace()), arb_identifier()).prop_map(|(prefix, id)| {
            match prefix {
                Some(prefix) => format!("{}:{}", prefix, id),
                None => id,
            }
        })
    }

    /// Key carrying the hash tag `{tag}`.
    pub fn arb_tagged_key(tag: &'static str) -> impl Strategy<Value = String> {
        arb_identifier().prop_map(move |id| format!("{{{}}}.{}", tag, id))
    }

    /// Arbitrary payload bytes.
    pub fn arb_payload() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(any::<u8>(), 0..256)
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert that `result` failed with a not-found store error.
pub fn assert_not_found<T: std::fmt::Debug>(result: StowageResult<T>) {
    match result {
        Err(err) if err.is_not_found() => {}
        other => panic!("expected NotFound, got {:?}", other),
    }
}

/// Assert that `result` failed with a cross-shard store error.
pub fn assert_cross_shard<T: std::fmt::Debug>(result: StowageResult<T>) {
    match result {
        Err(StowageError::Store(StoreError::CrossShard { .. })) => {}
        other => panic!("expected CrossShard, got {:?}", other),
    }
}
