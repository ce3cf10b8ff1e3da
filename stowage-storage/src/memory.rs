//! In-memory store for development and tests.
//!
//! Honours the full store contract, including TTLs (checked lazily on
//! access), without any network dependency.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stowage_core::{StoreError, StowageError, StowageResult};

use crate::traits::{CacheStore, MultiRead};

/// Default label for the in-memory store.
pub const MEMORY_NAME: &str = "Memory";

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

/// Store keeping entries in a process-local map.
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::named(MEMORY_NAME)
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store reporting `name` as its backend label.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Seed an entry without expiration.
    pub fn insert(&self, key: impl Into<String>, value: impl AsRef<[u8]>) {
        let mut entries = self.entries.write().unwrap_or_else(|err| err.into_inner());
        entries.insert(
            key.into(),
            Entry {
                value: value.as_ref().to_vec(),
                expires_at: None,
            },
        );
    }

    /// Live value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
        entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone())
    }

    /// Remaining time to live for `key`; `None` when absent or persistent.
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
        entries
            .get(key)
            .filter(|e| e.is_live(now))
            .and_then(|e| e.expires_at)
            .map(|at| at.saturating_duration_since(now))
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|err| err.into_inner());
        entries.values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned(&self, operation: &str, key: &str) -> StowageError {
        StoreError::Backend {
            backend: self.name.clone(),
            operation: operation.to_string(),
            key: key.to_string(),
            reason: "store lock poisoned".to_string(),
        }
        .into()
    }
}

fn expiry(ttl: Duration) -> Option<Instant> {
    if ttl.is_zero() {
        None
    } else {
        Instant::now().checked_add(ttl)
    }
}

#[async_trait]
impl CacheStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| self.poisoned("Get", key))?;

        entries
            .get(key)
            .filter(|e| e.is_live(Instant::now()))
            .map(|e| e.value.clone())
            .ok_or_else(|| {
                StoreError::NotFound {
                    key: key.to_string(),
                }
                .into()
            })
    }

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead> {
        let now = Instant::now();
        let entries = self
            .entries
            .read()
            .map_err(|_| self.poisoned("MGet", &keys.join(",")))?;

        Ok(keys
            .iter()
            .map(|key| {
                let value = entries
                    .get(key)
                    .filter(|e| e.is_live(now))
                    .map(|e| e.value.clone());
                (key.clone(), value)
            })
            .collect())
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| self.poisoned("Set", key))?;

        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_vec(),
                expires_at: expiry(ttl),
            },
        );
        Ok(())
    }

    async fn incr(&self, key: &str) -> StowageResult<i64> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| self.poisoned("Incr", key))?;

        let (current, expires_at) = match entries.get(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                let n = std::str::from_utf8(&entry.value)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| StoreError::Backend {
                        backend: self.name.clone(),
                        operation: "Incr".to_string(),
                        key: key.to_string(),
                        reason: "value is not an integer".to_string(),
                    })?;
                (n, entry.expires_at)
            }
            None => (0, None),
        };

        let next = current.checked_add(1).ok_or_else(|| StoreError::Backend {
            backend: self.name.clone(),
            operation: "Incr".to_string(),
            key: key.to_string(),
            reason: "increment would overflow".to_string(),
        })?;

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool> {
        let now = Instant::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| self.poisoned("Expire", key))?;

        match entries.get_mut(key).filter(|e| e.is_live(now)) {
            Some(entry) => {
                entry.expires_at = now.checked_add(ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
