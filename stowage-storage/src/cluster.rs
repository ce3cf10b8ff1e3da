//! Redis Cluster store.
//!
//! Identical to the single-node store except for batch reads: every key of
//! a `read_multi` must hash to the same slot. Mixed batches are rejected
//! locally before any command is sent, never split across shards.

use std::time::Duration;

use async_trait::async_trait;
use redis::cluster::ClusterClient;
use redis::cluster_async::ClusterConnection;
use stowage_core::{StoreError, StowageResult};

use crate::driver::{store_error, KvConnection, RedisDriver};
use crate::slot::same_slot;
use crate::traits::{zip_multi, CacheStore, MultiRead};

/// Backend label for cluster stores.
pub const REDIS_CLUSTER_NAME: &str = "Redis Cluster";

/// Store backed by a sharded Redis Cluster.
pub struct RedisClusterStore<D = RedisDriver<ClusterConnection>> {
    driver: D,
}

impl<D: KvConnection> RedisClusterStore<D> {
    pub fn new(driver: D) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }
}

impl RedisClusterStore {
    /// Connect to a cluster through any of its seed nodes.
    pub async fn connect(addrs: &[String]) -> StowageResult<Self> {
        let nodes: Vec<String> = addrs
            .iter()
            .map(|addr| {
                if addr.contains("://") {
                    addr.clone()
                } else {
                    format!("redis://{}", addr)
                }
            })
            .collect();

        let label = addrs.join(",");
        let client = ClusterClient::new(nodes).map_err(|e| connect_error(&label, e))?;
        let conn = client
            .get_async_connection()
            .await
            .map_err(|e| connect_error(&label, e))?;

        tracing::debug!(seeds = %label, "Opened Redis Cluster connection");
        Ok(Self::new(RedisDriver::new(conn)))
    }
}

fn connect_error(addrs: &str, e: redis::RedisError) -> stowage_core::StowageError {
    StoreError::Backend {
        backend: REDIS_CLUSTER_NAME.to_string(),
        operation: "Connect".to_string(),
        key: addrs.to_string(),
        reason: e.to_string(),
    }
    .into()
}

#[async_trait]
impl<D: KvConnection> CacheStore for RedisClusterStore<D> {
    fn name(&self) -> &str {
        REDIS_CLUSTER_NAME
    }

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>> {
        match self.driver.get(key).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(StoreError::NotFound {
                key: key.to_string(),
            }
            .into()),
            Err(e) => Err(store_error(REDIS_CLUSTER_NAME, "Get", &[key], e)),
        }
    }

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead> {
        if same_slot(keys)?.is_none() {
            return Ok(MultiRead::new());
        }

        let values = self.driver.mget(keys).await.map_err(|e| {
            let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
            store_error(REDIS_CLUSTER_NAME, "MGet", &refs, e)
        })?;

        zip_multi(REDIS_CLUSTER_NAME, keys, values)
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()> {
        let ttl = (!ttl.is_zero()).then_some(ttl);
        self.driver
            .set(key, value, ttl)
            .await
            .map_err(|e| store_error(REDIS_CLUSTER_NAME, "Set", &[key], e))
    }

    async fn incr(&self, key: &str) -> StowageResult<i64> {
        self.driver
            .incr(key)
            .await
            .map_err(|e| store_error(REDIS_CLUSTER_NAME, "Incr", &[key], e))
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool> {
        self.driver
            .expire(key, ttl)
            .await
            .map_err(|e| store_error(REDIS_CLUSTER_NAME, "Expire", &[key], e))
    }
}
