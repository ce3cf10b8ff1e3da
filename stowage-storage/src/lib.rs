//! Stowage Storage - Store Contract and Backends
//!
//! One contract, [`CacheStore`], with two Redis implementations (single
//! node and cluster) selected once from configuration, an in-memory store,
//! and a latency decorator that reports to an optional metrics sink.

pub mod cluster;
pub mod connect;
pub mod driver;
pub mod instrumented;
pub mod memory;
pub mod metrics;
pub mod redis_backend;
pub mod slot;
pub mod traits;

pub use cluster::{RedisClusterStore, REDIS_CLUSTER_NAME};
pub use connect::{connect, metrics_sink};
pub use driver::{DriverError, DriverResult, KvConnection, RedisDriver};
pub use instrumented::{action, InstrumentedStore, MetricsSink};
pub use memory::{InMemoryStore, MEMORY_NAME};
pub use metrics::{PrometheusSink, CACHE_LATENCY_METRIC};
pub use redis_backend::{RedisStore, REDIS_NAME};
pub use slot::{hash_tag, key_slot, same_slot, SLOT_COUNT};
pub use traits::{CacheStore, MultiRead};
