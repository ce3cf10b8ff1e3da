//! HTTP front for the provider.
//!
//! - `GET /cache/*key` runs a cache-aside read for `key` and reports the
//!   terminal state in the `X-Cache` header (`HIT` or `MISS`).
//! - `GET /metrics` exports the registry in Prometheus text format.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::{Request, Uri};
use prometheus::{Encoder, Registry, TextEncoder};
use stowage_core::{
    ConfigError, OriginError, ResolveError, StoreError, StowageConfig, StowageError,
    StowageResult,
};
use tokio_util::sync::CancellationToken;

use crate::orchestrator::{CacheOutcome, CacheProvider};

/// Response header reporting whether the store served the request.
pub const X_CACHE: &str = "x-cache";

/// Errors raised while running the HTTP front.
#[derive(Debug, thiserror::Error)]
pub enum ServeError {
    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server error: {0}")]
    Serve(String),

    #[error(transparent)]
    Stowage(#[from] StowageError),
}

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    provider: Arc<CacheProvider>,
    origin: Uri,
    registry: Registry,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        provider: Arc<CacheProvider>,
        origin: Uri,
        registry: Registry,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            provider,
            origin,
            registry,
            shutdown,
        }
    }

    /// Template request pointed at the origin base URL.
    pub fn template(&self) -> Request<()> {
        let mut request = Request::new(());
        *request.uri_mut() = self.origin.clone();
        request
    }
}

/// Parse the configured origin base URL.
pub fn origin_uri(config: &StowageConfig) -> StowageResult<Uri> {
    let url = config
        .origin_url
        .as_deref()
        .ok_or_else(|| ConfigError::MissingRequired {
            field: "origin_url".to_string(),
        })?;

    url.parse::<Uri>().map_err(|e| {
        ConfigError::InvalidValue {
            field: "origin_url".to_string(),
            value: url.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Build the router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/cache/*key", get(read_fetch_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// `StowageError` rendered as an HTTP response.
#[derive(Debug)]
pub struct HttpError(pub StowageError);

impl HttpError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            StowageError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            StowageError::Store(StoreError::CrossShard { .. }) => StatusCode::BAD_REQUEST,
            StowageError::Store(StoreError::Backend { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            StowageError::Resolve(ResolveError::UnknownKey { .. }) => StatusCode::NOT_FOUND,
            StowageError::Resolve(ResolveError::InvalidTarget { .. }) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            StowageError::Origin(OriginError::Status { .. })
            | StowageError::Origin(OriginError::Transport { .. }) => StatusCode::BAD_GATEWAY,
            StowageError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            StowageError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<StowageError> for HttpError {
    fn from(err: StowageError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(serde_json::json!({ "error": self.0.to_string() }));
        (status, body).into_response()
    }
}

async fn read_fetch_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, HttpError> {
    let cancel = state.shutdown.child_token();
    let template = state.template();

    let outcome = state.provider.read_fetch(&key, &template, &cancel).await?;

    let label = match &outcome {
        CacheOutcome::Hit(_) => "HIT",
        CacheOutcome::Fetched { stored, .. } => {
            if !stored {
                tracing::info!(key = %key, "Served origin payload without write-back");
            }
            "MISS"
        }
    };

    let mut response = outcome.into_payload().into_response();
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(label));
    Ok(response)
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    match encoder.encode(&state.registry.gather(), &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
                .into_response()
        }
    }
}

/// Serve `router` on `addr` until `shutdown` is cancelled.
pub async fn serve(
    addr: &str,
    router: Router,
    shutdown: CancellationToken,
) -> Result<(), ServeError> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ServeError::Bind {
            addr: addr.to_string(),
            reason: e.to_string(),
        })?;

    tracing::info!(addr = %addr, "Starting stowage HTTP front");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| ServeError::Serve(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_uri() {
        let config = StowageConfig::new().with_origin("http://origin.local:8080");
        let uri = origin_uri(&config).unwrap();
        assert_eq!(uri.host(), Some("origin.local"));

        let err = origin_uri(&StowageConfig::new()).unwrap_err();
        assert!(matches!(
            err,
            StowageError::Config(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_status_mapping() {
        let not_found = HttpError(
            StoreError::NotFound {
                key: "foo".to_string(),
            }
            .into(),
        );
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let origin = HttpError(
            OriginError::Status {
                url: "http://origin.local/bad".to_string(),
                status: 500,
            }
            .into(),
        );
        assert_eq!(origin.status_code(), StatusCode::BAD_GATEWAY);

        let cancelled = HttpError(StowageError::Cancelled {
            key: "zoo".to_string(),
        });
        assert_eq!(cancelled.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
