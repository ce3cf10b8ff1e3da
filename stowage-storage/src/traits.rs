//! The store contract shared by every backend.
//!
//! Single-node Redis, Redis Cluster, the in-memory store and the metrics
//! decorator all implement [`CacheStore`]. Callers select a variant once at
//! construction and hold it as `Arc<dyn CacheStore>`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use stowage_core::{StoreError, StowageResult};

/// Result of a batch read: every requested key, `None` for misses.
pub type MultiRead = HashMap<String, Option<Vec<u8>>>;

/// Uniform key/value store contract.
///
/// # Semantics
///
/// - `read` fails with `StoreError::NotFound` for absent keys.
/// - `read_multi` never fails because of a miss; absent keys map to `None`.
/// - `write` with a zero TTL stores the value without expiration.
/// - `incr` creates missing keys at 1.
/// - `expire` returns `false` when the key does not exist.
///
/// Transport failures surface as `StoreError::Backend` and are not retried.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Human-readable backend label, used only for observability.
    fn name(&self) -> &str;

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>>;

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead>;

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()>;

    async fn incr(&self, key: &str) -> StowageResult<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool>;
}

#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>> {
        (**self).read(key).await
    }

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead> {
        (**self).read_multi(keys).await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()> {
        (**self).write(key, value, ttl).await
    }

    async fn incr(&self, key: &str) -> StowageResult<i64> {
        (**self).incr(key).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool> {
        (**self).expire(key, ttl).await
    }
}

/// Pair batch keys with positional driver values.
///
/// Drivers answer `MGET` in request order; a length mismatch is a protocol
/// fault, not a partial result.
pub(crate) fn zip_multi(
    backend: &str,
    keys: &[String],
    values: Vec<Option<Vec<u8>>>,
) -> StowageResult<MultiRead> {
    if values.len() != keys.len() {
        return Err(StoreError::Backend {
            backend: backend.to_string(),
            operation: "MGet".to_string(),
            key: keys.join(","),
            reason: format!("expected {} values, got {}", keys.len(), values.len()),
        }
        .into());
    }

    Ok(keys.iter().cloned().zip(values).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::StowageError;

    #[test]
    fn test_zip_multi_keeps_misses() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let result = zip_multi("Redis", &keys, vec![Some(b"1".to_vec()), None]).unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result["a"], Some(b"1".to_vec()));
        assert_eq!(result["b"], None);
    }

    #[test]
    fn test_zip_multi_length_mismatch() {
        let keys = vec!["a".to_string(), "b".to_string()];
        let err = zip_multi("Redis", &keys, vec![None]).unwrap_err();
        assert!(matches!(
            err,
            StowageError::Store(StoreError::Backend { .. })
        ));
    }
}
