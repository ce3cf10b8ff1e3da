//! Prometheus metrics sink
//!
//! Records store latency into the `cache_latency_seconds` histogram,
//! labelled by backend `name` and `action`.

use std::time::Duration;

use prometheus::{HistogramOpts, HistogramVec, Registry};
use stowage_core::{ConfigError, StowageResult};

use crate::instrumented::MetricsSink;

/// Histogram name for store latency.
pub const CACHE_LATENCY_METRIC: &str = "cache_latency_seconds";

/// Store latency buckets (seconds)
/// Covers: 0.1ms, 0.5ms, 1ms, 2.5ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s
const CACHE_LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0,
];

/// [`MetricsSink`] backed by a Prometheus histogram.
#[derive(Clone)]
pub struct PrometheusSink {
    /// Store latency histogram - labels: name, action
    pub cache_latency: HistogramVec,
}

impl PrometheusSink {
    /// Create the histogram and register it with `registry`.
    pub fn new(registry: &Registry) -> StowageResult<Self> {
        let opts = HistogramOpts::new(
            CACHE_LATENCY_METRIC,
            "A histogram of the cache latency in seconds.",
        )
        .buckets(CACHE_LATENCY_BUCKETS.to_vec());

        let cache_latency =
            HistogramVec::new(opts, &["name", "action"]).map_err(registration_error)?;
        registry
            .register(Box::new(cache_latency.clone()))
            .map_err(registration_error)?;

        Ok(Self { cache_latency })
    }
}

fn registration_error(e: prometheus::Error) -> stowage_core::StowageError {
    ConfigError::InvalidValue {
        field: "metrics".to_string(),
        value: CACHE_LATENCY_METRIC.to_string(),
        reason: e.to_string(),
    }
    .into()
}

impl MetricsSink for PrometheusSink {
    fn observe(&self, backend: &str, action: &str, elapsed: Duration) {
        self.cache_latency
            .with_label_values(&[backend, action])
            .observe(elapsed.as_secs_f64());
    }
}
