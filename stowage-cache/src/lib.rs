//! Stowage Cache - Cache-Aside Provider
//!
//! Normalizes keys, reads the store, and on a miss resolves the key to an
//! origin request, fetches it and writes the payload back. Also hosts the
//! tracing setup and the HTTP front used by the `stowage` binary.

pub mod orchestrator;
pub mod origin;
pub mod resolver;
pub mod server;
pub mod telemetry;

pub use orchestrator::{CacheOutcome, CacheProvider, ProviderConfig};
pub use origin::{HttpOrigin, OriginTransport};
pub use resolver::{clone_request, with_path, Resolver, StaticResolver};
pub use server::{origin_uri, router, serve, AppState, HttpError, ServeError, X_CACHE};
pub use telemetry::{init_tracing, TelemetryConfig};

// Re-export core types for convenience
pub use stowage_core::{CacheKey, StowageConfig, StowageError, StowageResult};
