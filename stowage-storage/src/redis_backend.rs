//! Single-node Redis store.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use stowage_core::{StoreError, StowageResult};

use crate::driver::{store_error, KvConnection, RedisDriver};
use crate::traits::{zip_multi, CacheStore, MultiRead};

/// Backend label for single-node stores.
pub const REDIS_NAME: &str = "Redis";

/// Store backed by one Redis node and a logical database.
///
/// # Example
///
/// ```ignore
/// let store = RedisStore::connect("127.0.0.1:6379", 0).await?;
/// store.write("api:foo", br#"{"foo":"bar"}"#, Duration::from_secs(60)).await?;
/// let bytes = store.read("api:foo").await?;
/// ```
pub struct RedisStore<D = RedisDriver<ConnectionManager>> {
    driver: D,
}

impl<D: KvConnection> RedisStore<D> {
    /// Wrap an existing driver connection.
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl RedisStore {
    /// Open a managed connection to `addr`, selecting database `db`.
    ///
    /// `addr` may be `host:port` or a full `redis://` URL; a URL is used as is.
    pub async fn connect(addr: &str, db: i64) -> StowageResult<Self> {
        let url = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("redis://{}/{}", addr, db)
        };

        let client = redis::Client::open(url.as_str()).map_err(|e| connect_error(addr, e))?;
        let manager = client
            .get_connection_manager()
            .await
            .map_err(|e| connect_error(addr, e))?;

        tracing::debug!(addr, db, "Opened Redis connection manager");
        Ok(Self::new(RedisDriver::new(manager)))
    }
}

fn connect_error(addr: &str, e: redis::RedisError) -> stowage_core::StowageError {
    StoreError::Backend {
        backend: REDIS_NAME.to_string(),
        operation: "Connect".to_string(),
        key: addr.to_string(),
        reason: e.to_string(),
    }
    .into()
}

#[async_trait]
impl<D: KvConnection> CacheStore for RedisStore<D> {
    fn name(&self) -> &str {
        REDIS_NAME
    }

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>> {
        match self.driver.get(key).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(StoreError::NotFound {
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(store_error(REDIS_NAME, "Get", &[key], e)),
        }
    }

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead> {
        if keys.is_empty() {
            return Ok(MultiRead::new());
        }

        let values = self.driver.mget(keys).await.map_err(|e| {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            store_error(REDIS_NAME, "MGet", &refs, e)
        })?;

        zip_multi(REDIS_NAME, keys, values)
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()> {
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.driver
            .set(key, value, ttl)
            .await
            .map_err(|e| store_error(REDIS_NAME, "Set", &[key], e))
    }

    async fn incr(&self, key: &str) -> StowageResult<i64> {
        self.driver
            .incr(key)
            .await
            .map_err(|e| store_error(REDIS_NAME, "Incr", &[key], e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool> {
        self.driver
            .expire(key, ttl)
            .await
            .map_err(|e| store_error(REDIS_NAME, "Expire", &[key], e))
    }
}
