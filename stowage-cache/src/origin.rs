//! Origin transport.
//!
//! Sends a resolved request to the origin and returns the payload. Any
//! non-2xx status or transport failure is an [`OriginError`].

use std::time::Duration;

use async_trait::async_trait;
use http::Request;
use stowage_core::{ConfigError, OriginError, StowageConfig, StowageResult};

/// Executes resolved requests against the origin.
#[async_trait]
pub trait OriginTransport: Send + Sync {
    async fn fetch(&self, request: Request<()>) -> StowageResult<Vec<u8>>;
}

/// [`OriginTransport`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpOrigin {
    client: reqwest::Client,
}

impl HttpOrigin {
    /// Build a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> StowageResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "origin_timeout".to_string(),
                value: format!("{:?}", timeout),
                reason: e.to_string(),
            })?;
        Ok(Self { client })
    }

    pub fn from_config(config: &StowageConfig) -> StowageResult<Self> {
        Self::new(config.origin_timeout)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl OriginTransport for HttpOrigin {
    async fn fetch(&self, request: Request<()>) -> StowageResult<Vec<u8>> {
        let url = request.uri().to_string();

        let response = self
            .client
            .request(request.method().clone(), url.as_str())
            .headers(request.headers().clone())
            .send()
            .await
            .map_err(|e| OriginError::Transport {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::Status {
                url,
                status: status.as_u16(),
            }
            .into());
        }

        let body = response.bytes().await.map_err(|e| OriginError::Transport {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        tracing::debug!(url = %url, bytes = body.len(), "Fetched origin payload");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stowage_core::StowageError;

    #[test]
    fn test_from_config() {
        let config = StowageConfig::new().with_origin("http://localhost:9");
        assert!(HttpOrigin::from_config(&config).is_ok());
    }

    #[tokio::test]
    async fn test_relative_uri_is_transport_error() {
        let origin = HttpOrigin::new(Duration::from_secs(1)).unwrap();
        let mut request = Request::new(());
        *request.uri_mut() = http::Uri::from_static("/zoo");

        let err = origin.fetch(request).await.unwrap_err();
        assert!(matches!(
            err,
            StowageError::Origin(OriginError::Transport { .. })
        ));
    }
}
