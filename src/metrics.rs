//! Prometheus metrics for the reader
//!
//! Render throughput, per-tenant latency, function invocation counts and
//! throttling rejections. Everything here is fire-and-forget; evaluation
//! behavior never depends on it.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Render requests by tenant and outcome
    pub static ref RENDER_REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        "reader_render_requests_total",
        "Total render requests",
        &["tenant", "status"]
    ).unwrap();

    /// Render request latency
    pub static ref RENDER_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "reader_render_duration_seconds",
        "Render request latency in seconds",
        &["tenant"],
        vec![0.005, 0.025, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();

    /// Function invocations during evaluation
    pub static ref FUNCTION_CALLS_TOTAL: CounterVec = register_counter_vec!(
        "reader_function_calls_total",
        "Total evaluated function invocations",
        &["function"]
    ).unwrap();

    /// Admission-control rejections
    pub static ref THROTTLE_REJECTIONS_TOTAL: CounterVec = register_counter_vec!(
        "reader_throttle_rejections_total",
        "Total throttled requests",
        &["tenant", "reason"]
    ).unwrap();

    /// Concrete paths resolved from patterns
    pub static ref PATHS_RESOLVED_TOTAL: CounterVec = register_counter_vec!(
        "reader_paths_resolved_total",
        "Total concrete paths resolved from patterns",
        &["tenant"]
    ).unwrap();
}

/// Initialize the metrics system
pub fn init() {
    // Touch one collector so the registry is live before the first scrape
    lazy_static::initialize(&RENDER_REQUESTS_TOTAL);
    tracing::info!("metrics registry initialized");
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("metrics contain invalid UTF-8: {}", e))
}

/// Record a completed render request
#[inline]
pub fn record_render(tenant: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    RENDER_REQUESTS_TOTAL
        .with_label_values(&[tenant, status])
        .inc();

    RENDER_DURATION_SECONDS
        .with_label_values(&[tenant])
        .observe(duration_secs);
}

/// Record one function invocation
#[inline]
pub fn record_function_call(function: &str) {
    FUNCTION_CALLS_TOTAL.with_label_values(&[function]).inc();
}

/// Record a throttled request
#[inline]
pub fn record_throttled(tenant: &str, reason: &str) {
    THROTTLE_REJECTIONS_TOTAL
        .with_label_values(&[tenant, reason])
        .inc();
}

/// Record resolved path cardinality for a leaf
#[inline]
pub fn record_paths_resolved(tenant: &str, count: usize) {
    PATHS_RESOLVED_TOTAL
        .with_label_values(&[tenant])
        .inc_by(count as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gather_metrics() {
        init();
        record_render("test", 0.01, true);
        let metrics = gather_metrics().expect("failed to gather metrics");
        assert!(metrics.contains("reader_render_requests_total"));
    }

    #[test]
    fn test_record_function_call() {
        record_function_call("sumSeries");
        let metrics = gather_metrics().expect("failed to gather metrics");
        assert!(metrics.contains("reader_function_calls_total"));
    }
}
