//! Configuration types
//!
//! Configuration is assembled once at startup, either from environment
//! variables or programmatically, and never mutated afterwards.

use crate::{ConfigError, StowageResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which store variant a configuration selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// A single Redis node with a logical database selector.
    Single,
    /// A sharded Redis Cluster; the database selector is ignored.
    Cluster,
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StowageConfig {
    // Store
    /// Backend addresses (`host:port`). More than one selects cluster mode.
    pub redis_addrs: Vec<String>,
    /// Logical database for single-node mode.
    pub redis_db: i64,

    // Keys
    /// Namespace applied to every key by the provider. Empty means none.
    pub namespace: String,
    /// TTL for entries written back after an origin fetch. Zero means no expiration.
    pub default_ttl: Duration,

    // Metrics
    pub metrics_enabled: bool,

    // Origin
    /// Base URL used to build template requests for origin fetches.
    pub origin_url: Option<String>,
    pub origin_timeout: Duration,
    /// Exact key to origin path mappings for the static resolver.
    pub routes: Vec<(String, String)>,

    // HTTP front
    pub bind_addr: String,
}

impl Default for StowageConfig {
    fn default() -> Self {
        Self {
            redis_addrs: vec!["127.0.0.1:6379".to_string()],
            redis_db: 0,
            namespace: String::new(),
            default_ttl: Duration::from_secs(300),
            metrics_enabled: true,
            origin_url: None,
            origin_timeout: Duration::from_secs(10),
            routes: Vec::new(),
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl StowageConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create StowageConfig from environment variables.
    ///
    /// Environment variables:
    /// - `STOWAGE_REDIS_ADDRS`: Comma-separated addresses (default: 127.0.0.1:6379)
    /// - `STOWAGE_REDIS_DB`: Logical database (default: 0)
    /// - `STOWAGE_NAMESPACE`: Key namespace (default: none)
    /// - `STOWAGE_DEFAULT_TTL_SECS`: Write-back TTL, 0 = no expiration (default: 300)
    /// - `STOWAGE_METRICS_ENABLED`: "true" or "false" (default: true)
    /// - `STOWAGE_ORIGIN_URL`: Origin base URL (default: none)
    /// - `STOWAGE_ORIGIN_TIMEOUT_MS`: Origin client timeout (default: 10000)
    /// - `STOWAGE_ROUTES`: Comma-separated `key=/path` pairs
    /// - `STOWAGE_BIND`: HTTP front bind address (default: 0.0.0.0:3000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let redis_addrs = std::env::var("STOWAGE_REDIS_ADDRS")
            .ok()
            .map(|s| split_list(&s))
            .filter(|addrs| !addrs.is_empty())
            .unwrap_or(defaults.redis_addrs);

        let redis_db = std::env::var("STOWAGE_REDIS_DB")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.redis_db);

        let namespace = std::env::var("STOWAGE_NAMESPACE").unwrap_or_default();

        let default_ttl = std::env::var("STOWAGE_DEFAULT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.default_ttl);

        let metrics_enabled = std::env::var("STOWAGE_METRICS_ENABLED")
            .ok()
            .map(|s| s.to_lowercase() != "false")
            .unwrap_or(true);

        let origin_url = std::env::var("STOWAGE_ORIGIN_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let origin_timeout = std::env::var("STOWAGE_ORIGIN_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.origin_timeout);

        let routes = std::env::var("STOWAGE_ROUTES")
            .ok()
            .map(|s| parse_routes(&s))
            .unwrap_or_default();

        let bind_addr = std::env::var("STOWAGE_BIND").unwrap_or(defaults.bind_addr);

        Self {
            redis_addrs,
            redis_db,
            namespace,
            default_ttl,
            metrics_enabled,
            origin_url,
            origin_timeout,
            routes,
            bind_addr,
        }
    }

    pub fn with_addrs<I, S>(mut self, addrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.redis_addrs = addrs.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_db(mut self, db: i64) -> Self {
        self.redis_db = db;
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    pub fn with_origin(mut self, url: impl Into<String>) -> Self {
        self.origin_url = Some(url.into());
        self
    }

    pub fn with_route(mut self, key: impl Into<String>, path: impl Into<String>) -> Self {
        self.routes.push((key.into(), path.into()));
        self
    }

    /// The store variant selected by the address list.
    pub fn backend_kind(&self) -> BackendKind {
        if self.redis_addrs.len() > 1 {
            BackendKind::Cluster
        } else {
            BackendKind::Single
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - at least one backend address, none empty
    /// - redis_db is non-negative
    /// - origin_url, when set, is an http(s) URL
    /// - every route path starts with '/'
    pub fn validate(&self) -> StowageResult<()> {
        if self.redis_addrs.is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "redis_addrs".to_string(),
            }
            .into());
        }

        if let Some(addr) = self.redis_addrs.iter().find(|a| a.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "redis_addrs".to_string(),
                value: addr.clone(),
                reason: "address must not be empty".to_string(),
            }
            .into());
        }

        if self.redis_db < 0 {
            return Err(ConfigError::InvalidValue {
                field: "redis_db".to_string(),
                value: self.redis_db.to_string(),
                reason: "redis_db must be non-negative".to_string(),
            }
            .into());
        }

        if let Some(url) = &self.origin_url {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: "origin_url".to_string(),
                    value: url.clone(),
                    reason: "origin_url must be an http or https URL".to_string(),
                }
                .into());
            }
        }

        if let Some((key, path)) = self.routes.iter().find(|(_, p)| !p.starts_with('/')) {
            return Err(ConfigError::InvalidValue {
                field: "routes".to_string(),
                value: format!("{}={}", key, path),
                reason: "route paths must start with '/'".to_string(),
            }
            .into());
        }

        Ok(())
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parse `key=/path` pairs. Malformed pairs are skipped.
fn parse_routes(s: &str) -> Vec<(String, String)> {
    split_list(s)
        .into_iter()
        .filter_map(|pair| {
            let (key, path) = pair.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), path.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StowageError;

    #[test]
    fn test_default_config() {
        let config = StowageConfig::default();
        assert_eq!(config.redis_addrs, vec!["127.0.0.1:6379".to_string()]);
        assert_eq!(config.redis_db, 0);
        assert!(config.namespace.is_empty());
        assert_eq!(config.default_ttl, Duration::from_secs(300));
        assert!(config.metrics_enabled);
        assert!(config.origin_url.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_kind() {
        let single = StowageConfig::new().with_addrs(["10.0.0.1:6379"]);
        assert_eq!(single.backend_kind(), BackendKind::Single);

        let cluster = StowageConfig::new().with_addrs(["10.0.0.1:7000", "10.0.0.2:7000"]);
        assert_eq!(cluster.backend_kind(), BackendKind::Cluster);
    }

    #[test]
    fn test_builder() {
        let config = StowageConfig::new()
            .with_db(3)
            .with_namespace("api")
            .with_ttl(Duration::from_secs(60))
            .with_metrics(false)
            .with_origin("http://127.0.0.1:8080")
            .with_route("zoo", "/zoo");

        assert_eq!(config.redis_db, 3);
        assert_eq!(config.namespace, "api");
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert!(!config.metrics_enabled);
        assert_eq!(config.origin_url.as_deref(), Some("http://127.0.0.1:8080"));
        assert_eq!(config.routes, vec![("zoo".to_string(), "/zoo".to_string())]);
    }

    #[test]
    fn test_validate_rejects_empty_addrs() {
        let config = StowageConfig::new().with_addrs(Vec::<String>::new());
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            StowageError::Config(ConfigError::MissingRequired { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        let config = StowageConfig::new().with_origin("ftp://origin");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_route() {
        let config = StowageConfig::new().with_route("zoo", "zoo");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_routes() {
        let routes = parse_routes("zoo=/zoo, api:zoo=/zoo,broken,=/nokey");
        assert_eq!(
            routes,
            vec![
                ("zoo".to_string(), "/zoo".to_string()),
                ("api:zoo".to_string(), "/zoo".to_string()),
            ]
        );
    }

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(" a:1 ,, b:2 "),
            vec!["a:1".to_string(), "b:2".to_string()]
        );
    }

    #[test]
    fn test_config_serializes() {
        let config = StowageConfig::new().with_namespace("api");
        let json = serde_json::to_string(&config).unwrap();
        let back: StowageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
