//! Stowage Core - Keys, Errors and Configuration
//!
//! Shared vocabulary for the stowage workspace. Every other crate depends on
//! this one; it has no I/O of its own.

pub mod config;
pub mod error;
pub mod key;

pub use config::{BackendKind, StowageConfig};
pub use error::{
    ConfigError, OriginError, ResolveError, StoreError, StowageError, StowageResult,
};
pub use key::{normalize, strip_namespace, CacheKey, SEPARATOR};
