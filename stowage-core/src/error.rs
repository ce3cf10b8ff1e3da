//! Error types for stowage operations

use thiserror::Error;

/// Store layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The key is absent. A normal outcome that drives the miss path.
    #[error("Key not found: {key}")]
    NotFound { key: String },

    #[error("Batch keys span multiple slots: {keys:?}")]
    CrossShard { keys: Vec<String> },

    #[error("{backend} {operation} failed for {key}: {reason}")]
    Backend {
        backend: String,
        operation: String,
        key: String,
        reason: String,
    },
}

/// Resolver errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No origin mapping for key: {key}")]
    UnknownKey { key: String },

    #[error("Invalid origin target for {key}: {reason}")]
    InvalidTarget { key: String, reason: String },
}

/// Origin fetch errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OriginError {
    #[error("Origin request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    #[error("Origin {url} responded with status {status}")]
    Status { url: String, status: u16 },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all stowage errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StowageError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Origin error: {0}")]
    Origin(#[from] OriginError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Request cancelled while handling {key}")]
    Cancelled { key: String },
}

impl StowageError {
    /// True when the error is a plain cache miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StowageError::Store(StoreError::NotFound { .. }))
    }
}

/// Result type alias for stowage operations.
pub type StowageResult<T> = Result<T, StowageError>;

// =============================================================================
// TESTS
// =============================================================================
