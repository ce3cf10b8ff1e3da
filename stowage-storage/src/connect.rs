//! Store construction from configuration.
//!
//! The single-node or cluster variant is picked here, once, from the
//! address list. Callers only ever see `Arc<dyn CacheStore>`.

use std::sync::Arc;

use prometheus::Registry;
use stowage_core::{BackendKind, ConfigError, StowageConfig, StowageResult};

use crate::cluster::RedisClusterStore;
use crate::instrumented::{InstrumentedStore, MetricsSink};
use crate::metrics::PrometheusSink;
use crate::redis_backend::RedisStore;
use crate::traits::CacheStore;

/// Build the metrics sink selected by `config`, if any.
///
/// Metrics are recorded only when enabled and a registry is supplied.
pub fn metrics_sink(
    config: &StowageConfig,
    registry: Option<&Registry>,
) -> StowageResult<Option<Arc<dyn MetricsSink>>> {
    match registry {
        Some(registry) if config.metrics_enabled => {
            let sink: Arc<dyn MetricsSink> = Arc::new(PrometheusSink::new(registry)?);
            Ok(Some(sink))
        }
        _ => Ok(None),
    }
}

/// Connect to the configured backend and wrap it with instrumentation.
pub async fn connect(
    config: &StowageConfig,
    registry: Option<&Registry>,
) -> StowageResult<Arc<dyn CacheStore>> {
    config.validate()?;
    let sink = metrics_sink(config, registry)?;

    let store: Arc<dyn CacheStore> = match config.backend_kind() {
        BackendKind::Single => {
            let addr = config
                .redis_addrs
                .first()
                .ok_or_else(|| ConfigError::MissingRequired {
                    field: "redis_addrs".to_string(),
                })?;
            let store = RedisStore::connect(addr, config.redis_db).await?;
            Arc::new(InstrumentedStore::new(store, sink))
        }
        BackendKind::Cluster => {
            let store = RedisClusterStore::connect(&config.redis_addrs).await?;
            Arc::new(InstrumentedStore::new(store, sink))
        }
    };

    tracing::info!(
        backend = store.name(),
        addrs = ?config.redis_addrs,
        metrics = config.metrics_enabled && registry.is_some(),
        "Cache store ready"
    );
    Ok(store)
}
