//! Driver seam between the store adapters and the Redis client.
//!
//! Adapters speak to a [`KvConnection`], never to `redis` types directly.
//! [`RedisDriver`] implements it for any async `redis` connection (the
//! single-node `ConnectionManager` and the cluster `ClusterConnection`);
//! tests substitute a fake that counts calls.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionLike;
use stowage_core::{StoreError, StowageError};

/// Errors reported by a driver connection.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DriverError {
    /// The server refused a multi-key command spanning several slots.
    #[error("CROSSSLOT {0}")]
    CrossSlot(String),

    #[error("{0}")]
    Transport(String),
}

impl From<redis::RedisError> for DriverError {
    fn from(e: redis::RedisError) -> Self {
        if e.kind() == redis::ErrorKind::CrossSlot {
            DriverError::CrossSlot(e.to_string())
        } else {
            DriverError::Transport(e.to_string())
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Raw key/value commands issued by the store adapters.
#[async_trait]
pub trait KvConnection: Send + Sync {
    async fn get(&self, key: &str) -> DriverResult<Option<Vec<u8>>>;

    /// Values in request order, `None` for missing keys.
    async fn mget(&self, keys: &[String]) -> DriverResult<Vec<Option<Vec<u8>>>>;

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> DriverResult<()>;

    async fn incr(&self, key: &str) -> DriverResult<i64>;

    async fn expire(&self, key: &str, ttl: Duration) -> DriverResult<bool>;
}

/// [`KvConnection`] over a `redis` async connection.
///
/// The wrapped connection is cloned per command; both `ConnectionManager`
/// and `ClusterConnection` are cheap handles over a shared multiplexer.
#[derive(Clone)]
pub struct RedisDriver<C> {
    conn: C,
}

impl<C> RedisDriver<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }
}

/// Milliseconds for PX/PEXPIRE, never below 1.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl<C> KvConnection for RedisDriver<C>
where
    C: ConnectionLike + Clone + Send + Sync + 'static,
{
    async fn get(&self, key: &str) -> DriverResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn mget(&self, keys: &[String]) -> DriverResult<Vec<Option<Vec<u8>>>> {
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> =
            redis::cmd("MGET").arg(keys).query_async(&mut conn).await?;
        Ok(values)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> DriverResult<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let _: () = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn incr(&self, key: &str) -> DriverResult<i64> {
        let mut conn = self.conn.clone();
        let n: i64 = redis::cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(n)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> DriverResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(applied)
    }
}

/// Convert a driver failure into the store taxonomy.
///
/// A server-side CROSSSLOT rejection maps to the same error as the local
/// slot check, so callers see one error whichever layer caught it.
pub(crate) fn store_error(
    backend: &str,
    operation: &str,
    keys: &[&str],
    err: DriverError,
) -> StowageError {
    match err {
        DriverError::CrossSlot(_) => StoreError::CrossShard {
            keys: keys.iter().map(|k| k.to_string()).collect(),
        }
        .into(),
        DriverError::Transport(reason) => StoreError::Backend {
            backend: backend.to_string(),
            operation: operation.to_string(),
            key: keys.join(","),
            reason,
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_millis() {
        assert_eq!(ttl_millis(Duration::from_secs(60)), 60_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
    }

    #[test]
    fn test_store_error_mapping() {
        let err = store_error(
            "Redis",
            "Get",
            &["foo"],
            DriverError::Transport("connection refused".to_string()),
        );
        assert_eq!(
            err,
            StowageError::Store(StoreError::Backend {
                backend: "Redis".to_string(),
                operation: "Get".to_string(),
                key: "foo".to_string(),
                reason: "connection refused".to_string(),
            })
        );

        let err = store_error(
            "Redis Cluster",
            "MGet",
            &["foo", "{x}.fox"],
            DriverError::CrossSlot("Keys in request don't hash to the same slot".to_string()),
        );
        assert_eq!(
            err,
            StowageError::Store(StoreError::CrossShard {
                keys: vec!["foo".to_string(), "{x}.fox".to_string()],
            })
        );
    }

    #[test]
    fn test_cross_slot_display() {
        let err = DriverError::CrossSlot("keys differ".to_string());
        assert!(err.to_string().contains("CROSSSLOT"));
    }
}
