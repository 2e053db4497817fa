//! Stats sink implementations
//!
//! Two variants of [`StatsService`]: a no-op used when reporting is disabled
//! (evaluation must behave identically with it) and a Prometheus-backed one
//! feeding the registry in [`crate::metrics`].

use std::time::Duration;

use crate::engine::traits::StatsService;
use crate::metrics;

/// Stats sink that discards everything
///
/// Used when stats reporting is disabled. Substituting this for any other
/// sink must not change evaluation results.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStatsService;

impl StatsService for NoopStatsService {
    fn record_render(&self, _tenant: &str, _duration: Duration, _success: bool) {}

    fn record_function_call(&self, _function: &str) {}

    fn record_paths_resolved(&self, _tenant: &str, _count: usize) {}

    fn record_throttled(&self, _tenant: &str, _reason: &str) {}

    fn shutdown(&self) {}
}

/// Stats sink backed by the process Prometheus registry
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusStatsService;

impl PrometheusStatsService {
    /// Create the sink, making sure the registry is initialized
    pub fn new() -> Self {
        metrics::init();
        Self
    }
}

impl StatsService for PrometheusStatsService {
    fn record_render(&self, tenant: &str, duration: Duration, success: bool) {
        metrics::record_render(tenant, duration.as_secs_f64(), success);
    }

    fn record_function_call(&self, function: &str) {
        metrics::record_function_call(function);
    }

    fn record_paths_resolved(&self, tenant: &str, count: usize) {
        metrics::record_paths_resolved(tenant, count);
    }

    fn record_throttled(&self, tenant: &str, reason: &str) {
        metrics::record_throttled(tenant, reason);
    }

    fn shutdown(&self) {
        tracing::info!("stats sink flushed");
    }
}
