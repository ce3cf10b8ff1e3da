//! Stowage HTTP front entry point.
//!
//! Reads configuration from `STOWAGE_*` variables, connects the store,
//! and serves `/cache/*key` and `/metrics` until Ctrl-C.

use std::sync::Arc;

use prometheus::Registry;
use stowage_cache::{
    init_tracing, origin_uri, router, serve, AppState, CacheProvider, HttpOrigin, ProviderConfig,
    ServeError, StaticResolver, StowageConfig, TelemetryConfig,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), ServeError> {
    init_tracing(&TelemetryConfig::from_env())?;

    let config = StowageConfig::from_env();
    let origin = origin_uri(&config)?;

    let registry = Registry::new();
    let store = stowage_storage::connect(&config, Some(&registry)).await?;

    let resolver = StaticResolver::from_config(&config);
    if resolver.is_empty() {
        tracing::warn!("No routes configured; every miss will fail to resolve");
    }

    let provider = CacheProvider::new(
        store,
        Arc::new(resolver),
        Arc::new(HttpOrigin::from_config(&config)?),
        ProviderConfig::from_config(&config),
    );

    let shutdown = CancellationToken::new();
    let state = AppState::new(Arc::new(provider), origin, registry, shutdown.clone());

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
        }
        signal.cancel();
    });

    serve(&config.bind_addr, router(state), shutdown).await
}
