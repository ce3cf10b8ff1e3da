//! Latency instrumentation as a store decorator.
//!
//! [`InstrumentedStore`] wraps any [`CacheStore`] and reports one
//! observation per call, labelled with the wrapped backend's name and the
//! action, whether the call succeeded or not. Results pass through
//! untouched. Without a sink the decorator only adds a branch.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use stowage_core::StowageResult;

use crate::traits::{CacheStore, MultiRead};

/// Action labels reported for each store operation.
pub mod action {
    pub const GET: &str = "Get";
    pub const MGET: &str = "MGet";
    pub const SET: &str = "Set";
    pub const INCR: &str = "Incr";
    pub const EXPIRE: &str = "Expire";
}

/// Receiver of store latency observations.
///
/// Implementations must be cheap and non-blocking; they run inline on the
/// request path.
pub trait MetricsSink: Send + Sync {
    fn observe(&self, backend: &str, action: &str, elapsed: Duration);
}

/// A [`CacheStore`] that times every call of the store it wraps.
pub struct InstrumentedStore<S> {
    inner: S,
    sink: Option<Arc<dyn MetricsSink>>,
}

impl<S: CacheStore> InstrumentedStore<S> {
    pub fn new(inner: S, sink: Option<Arc<dyn MetricsSink>>) -> Self {
        Self { inner, sink }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Run `op` once, reporting its latency when a sink is configured.
    async fn observed<T, F>(&self, action: &'static str, op: F) -> StowageResult<T>
    where
        F: Future<Output = StowageResult<T>>,
    {
        let Some(sink) = &self.sink else {
            return op.await;
        };

        let start = Instant::now();
        let result = op.await;
        sink.observe(self.inner.name(), action, start.elapsed());
        result
    }
}

#[async_trait]
impl<S: CacheStore> CacheStore for InstrumentedStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn read(&self, key: &str) -> StowageResult<Vec<u8>> {
        self.observed(action::GET, self.inner.read(key)).await
    }

    async fn read_multi(&self, keys: &[String]) -> StowageResult<MultiRead> {
        self.observed(action::MGET, self.inner.read_multi(keys)).await
    }

    async fn write(&self, key: &str, value: &[u8], ttl: Duration) -> StowageResult<()> {
        self.observed(action::SET, self.inner.write(key, value, ttl))
            .await
    }

    async fn incr(&self, key: &str) -> StowageResult<i64> {
        self.observed(action::INCR, self.inner.incr(key)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StowageResult<bool> {
        self.observed(action::EXPIRE, self.inner.expire(key, ttl))
            .await
    }
}
