//! Prometheus metrics for observability.
//!
//! This module provides metrics for monitoring the songsmith server:
//! - HTTP request metrics (latency, counts, errors)
//! - Orders by status (collected dynamically)
//! - Everything registered by `songsmith_core::metrics`

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use regex_lite::Regex;

use songsmith_core::order::OrderFilter;
use songsmith_core::OrderStatus;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "songsmith_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("songsmith_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "songsmith_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

/// Requests rejected for lacking a caller identity.
pub static CALLER_REJECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "songsmith_caller_rejections_total",
        "Total requests rejected for a missing user id header",
    )
    .unwrap()
});

// =============================================================================
// Order Metrics (collected dynamically)
// =============================================================================

/// Orders by current status.
pub static ORDERS_BY_STATUS: Lazy<IntGaugeVec> = Lazy::new(|| {
    IntGaugeVec::new(
        Opts::new("songsmith_orders_by_status", "Current order count by status"),
        &["status"],
    )
    .unwrap()
});

/// Recovery loop state (1 = running, 0 = stopped).
pub static RECOVERY_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "songsmith_recovery_running",
        "Whether the recovery loop is running (1) or stopped (0)",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    // HTTP
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();
    registry
        .register(Box::new(CALLER_REJECTIONS_TOTAL.clone()))
        .unwrap();

    // Orders
    registry
        .register(Box::new(ORDERS_BY_STATUS.clone()))
        .unwrap();
    registry
        .register(Box::new(RECOVERY_RUNNING.clone()))
        .unwrap();

    // Core metrics (pipeline, provider, approvals, notifications, recovery)
    for metric in songsmith_core::metrics::all_metrics() {
        registry.register(metric).unwrap();
    }
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Refresh gauges from current application state before encoding.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    RECOVERY_RUNNING.set(if state.recovery().is_running() { 1 } else { 0 });

    let store = state.orders().store();
    for status in OrderStatus::ALL {
        let filter = OrderFilter::new().with_status(status);
        if let Ok(count) = store.count(&filter) {
            ORDERS_BY_STATUS
                .with_label_values(&[status.as_str()])
                .set(count);
        }
    }
}

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}")
        .unwrap()
});
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+(/|$)").unwrap());

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let result = UUID_RE.replace_all(path, "{id}");
    let result = NUMERIC_RE.replace_all(&result, "/{id}$1");
    result.to_string()
}
