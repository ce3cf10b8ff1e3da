//! Cache-aside provider.
//!
//! [`CacheProvider`] ties the pieces together for one request:
//! normalize the key, read the store, and on a miss resolve the origin
//! request, fetch it and write the payload back. A store miss is the only
//! error that falls through to the origin; every other failure ends the
//! request. A failed write-back is logged and reported on the outcome while
//! the caller still gets the payload.
//!
//! Every operation takes a [`CancellationToken`]. Cancellation is observed
//! around the store read and the origin fetch; once cancelled, nothing is
//! written to the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use http::Request;
use stowage_core::{CacheKey, StowageConfig, StowageError, StowageResult};
use stowage_storage::{CacheStore, MultiRead};
use tokio_util::sync::CancellationToken;

use crate::origin::OriginTransport;
use crate::resolver::Resolver;

/// Provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Namespace applied to every key before it reaches the store.
    pub namespace: String,
    /// TTL for written-back entries. Zero means no expiration.
    pub ttl: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            ttl: Duration::from_secs(300),
        }
    }
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &StowageConfig) -> Self {
        Self {
            namespace: config.namespace.clone(),
            ttl: config.default_ttl,
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Successful terminal state of a provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheOutcome {
    /// Served from the store.
    Hit(Vec<u8>),
    /// Served from the origin. `stored` is false when the write-back failed.
    Fetched { payload: Vec<u8>, stored: bool },
}

impl CacheOutcome {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheOutcome::Hit(_))
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            CacheOutcome::Hit(payload) | CacheOutcome::Fetched { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> Vec<u8> {
        match self {
            CacheOutcome::Hit(payload) | CacheOutcome::Fetched { payload, .. } => payload,
        }
    }
}

/// Read-through provider over a store, a resolver and an origin.
#[derive(Clone)]
pub struct CacheProvider {
    store: Arc<dyn CacheStore>,
    resolver: Arc<dyn Resolver>,
    origin: Arc<dyn OriginTransport>,
    config: ProviderConfig,
}

impl CacheProvider {
    pub fn new(
        store: Arc<dyn CacheStore>,
        resolver: Arc<dyn Resolver>,
        origin: Arc<dyn OriginTransport>,
        config: ProviderConfig,
    ) -> Self {
        Self {
            store,
            resolver,
            origin,
            config,
        }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn CacheStore {
        self.store.as_ref()
    }

    /// Store key for a caller-supplied key.
    pub fn normalize(&self, key: &str) -> CacheKey {
        CacheKey::new(key, &self.config.namespace)
    }

    /// Read the normalized key from the store only.
    pub async fn read(&self, key: &str, cancel: &CancellationToken) -> StowageResult<Vec<u8>> {
        let cache_key = self.normalize(key);
        guarded(key, cancel, self.store.read(cache_key.as_str())).await
    }

    /// Batch read keyed by the caller's raw keys; misses map to `None`.
    pub async fn read_multi(
        &self,
        keys: &[String],
        cancel: &CancellationToken,
    ) -> StowageResult<MultiRead> {
        let normalized: Vec<String> = keys
            .iter()
            .map(|key| self.normalize(key).into_string())
            .collect();

        let label = keys.join(",");
        let values = guarded(&label, cancel, self.store.read_multi(&normalized)).await?;

        // Distinct raw keys may normalize to the same store key.
        Ok(keys
            .iter()
            .zip(normalized.iter())
            .map(|(raw, norm)| (raw.clone(), values.get(norm).cloned().flatten()))
            .collect::<HashMap<_, _>>())
    }

    /// Fetch from the origin and write back, skipping the store read.
    pub async fn fetch(
        &self,
        key: &str,
        template: &Request<()>,
        cancel: &CancellationToken,
    ) -> StowageResult<CacheOutcome> {
        let cache_key = self.normalize(key);
        self.fetch_and_store(key, &cache_key, template, cancel).await
    }

    /// Full cache-aside read: store first, origin on a miss.
    pub async fn read_fetch(
        &self,
        key: &str,
        template: &Request<()>,
        cancel: &CancellationToken,
    ) -> StowageResult<CacheOutcome> {
        let cache_key = self.normalize(key);

        match guarded(key, cancel, self.store.read(cache_key.as_str())).await {
            Ok(payload) => {
                tracing::debug!(key = %cache_key, "Cache hit");
                Ok(CacheOutcome::Hit(payload))
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(key = %cache_key, "Cache miss");
                self.fetch_and_store(key, &cache_key, template, cancel).await
            }
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "Cache read failed");
                Err(e)
            }
        }
    }

    async fn fetch_and_store(
        &self,
        key: &str,
        cache_key: &CacheKey,
        template: &Request<()>,
        cancel: &CancellationToken,
    ) -> StowageResult<CacheOutcome> {
        let request = self.resolver.resolve(key, template)?;
        tracing::debug!(key = %cache_key, uri = %request.uri(), "Fetching from origin");

        let payload = guarded(key, cancel, self.origin.fetch(request)).await?;

        if cancel.is_cancelled() {
            return Err(cancelled(key));
        }

        let stored = match self
            .store
            .write(cache_key.as_str(), &payload, self.config.ttl)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %cache_key, error = %e, "Cache write-back failed");
                false
            }
        };

        Ok(CacheOutcome::Fetched { payload, stored })
    }
}

fn cancelled(key: &str) -> StowageError {
    StowageError::Cancelled {
        key: key.to_string(),
    }
}

/// Run `op` unless `cancel` fires first.
async fn guarded<T, F>(key: &str, cancel: &CancellationToken, op: F) -> StowageResult<T>
where
    F: Future<Output = StowageResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(cancelled(key)),
        result = op => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::StaticResolver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stowage_core::{OriginError, ResolveError, StoreError};
    use stowage_storage::InMemoryStore;

    struct StaticOrigin {
        calls: AtomicUsize,
    }

    impl StaticOrigin {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl OriginTransport for StaticOrigin {
        async fn fetch(&self, request: Request<()>) -> StowageResult<Vec<u8>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match request.uri().path() {
                "/zoo" => Ok(br#"{"zoo":"zac"}"#.to_vec()),
                path => Err(OriginError::Status {
                    url: path.to_string(),
                    status: 500,
                }
                .into()),
            }
        }
    }

    fn provider(store: Arc<InMemoryStore>, origin: Arc<StaticOrigin>) -> CacheProvider {
        let resolver = StaticResolver::new([("zoo", "/zoo"), ("bad", "/bad")]);
        CacheProvider::new(
            store,
            Arc::new(resolver),
            origin,
            ProviderConfig::new().with_namespace("api"),
        )
    }

    fn template() -> Request<()> {
        let mut request = Request::new(());
        *request.uri_mut() = http::Uri::from_static("http://origin.local/");
        request
    }

    #[tokio::test]
    async fn test_hit_skips_origin() {
        let store = Arc::new(InMemoryStore::new());
        store.insert("api:foo", br#"{"foo":"bar"}"#);
        let origin = StaticOrigin::new();
        let provider = provider(store, origin.clone());

        let outcome = provider
            .read_fetch("foo", &template(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcome, CacheOutcome::Hit(br#"{"foo":"bar"}"#.to_vec()));
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_miss_fetches_and_writes_back() {
        let store = Arc::new(InMemoryStore::new());
        let provider = provider(store.clone(), StaticOrigin::new());

        let outcome = provider
            .read_fetch("zoo", &template(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(!outcome.is_hit());
        assert_eq!(outcome.payload(), br#"{"zoo":"zac"}"#);
        assert_eq!(store.get("api:zoo"), Some(br#"{"zoo":"zac"}"#.to_vec()));
        assert!(store.ttl("api:zoo").is_some());
    }

    #[tokio::test]
    async fn test_unknown_key_fails() {
        let provider = provider(Arc::new(InMemoryStore::new()), StaticOrigin::new());
        let err = provider
            .read_fetch("nope", &template(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StowageError::Resolve(ResolveError::UnknownKey { .. })
        ));
    }

    #[tokio::test]
    async fn test_origin_failure_writes_nothing() {
        let store = Arc::new(InMemoryStore::new());
        let provider = provider(store.clone(), StaticOrigin::new());

        let err = provider
            .read_fetch("bad", &template(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StowageError::Origin(OriginError::Status { status: 500, .. })
        ));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let store = Arc::new(InMemoryStore::new());
        let origin = StaticOrigin::new();
        let provider = provider(store.clone(), origin.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = provider
            .read_fetch("zoo", &template(), &cancel)
            .await
            .unwrap_err();

        assert_eq!(
            err,
            StowageError::Cancelled {
                key: "zoo".to_string(),
            }
        );
        assert_eq!(origin.calls.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_read_multi_uses_raw_keys() {
        let store = Arc::new(InMemoryStore::new());
        store.insert("api:foo", b"1");
        let provider = provider(store, StaticOrigin::new());

        let keys = vec!["foo".to_string(), "other:foo".to_string(), "boo".to_string()];
        let values = provider
            .read_multi(&keys, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values["foo"], Some(b"1".to_vec()));
        assert_eq!(values["other:foo"], Some(b"1".to_vec()));
        assert_eq!(values["boo"], None);
    }

    #[tokio::test]
    async fn test_read_miss_is_not_found() {
        let provider = provider(Arc::new(InMemoryStore::new()), StaticOrigin::new());
        let err = provider
            .read("foo", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            StowageError::Store(StoreError::NotFound {
                key: "api:foo".to_string(),
            })
        );
    }

    #[test]
    fn test_config_from_stowage_config() {
        let config = StowageConfig::new()
            .with_namespace("api")
            .with_ttl(Duration::from_secs(60));
        let provider_config = ProviderConfig::from_config(&config);
        assert_eq!(provider_config.namespace, "api");
        assert_eq!(provider_config.ttl, Duration::from_secs(60));
    }
}
