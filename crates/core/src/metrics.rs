//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Order state machine (transitions)
//! - Lyric pipeline (generations, moderation, provider calls)
//! - Approval, notifications, recovery sweeps
//! - Event log writes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Orders
// =============================================================================

/// Status transitions applied, by target status.
pub static ORDER_TRANSITIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "songsmith_order_transitions_total",
            "Total order status transitions",
        ),
        &["to"],
    )
    .unwrap()
});

// =============================================================================
// Lyric generation
// =============================================================================

/// Lyric generation attempts by result.
pub static LYRIC_GENERATIONS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "songsmith_lyric_generations_total",
            "Total lyric generation attempts",
        ),
        &["result"], // "generated", "already_generated", "rejected", "failed"
    )
    .unwrap()
});

/// Lyric generation duration in seconds.
pub static LYRIC_GENERATION_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "songsmith_lyric_generation_duration_seconds",
            "Duration of lyric generation including the provider call",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0, 60.0]),
        &["result"],
    )
    .unwrap()
});

/// Texts rejected by the content moderator.
pub static MODERATION_REJECTIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "songsmith_moderation_rejections_total",
        "Total texts rejected by moderation",
    )
    .unwrap()
});

/// Provider HTTP calls by protocol and result.
pub static PROVIDER_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "songsmith_provider_calls_total",
            "Total generation provider calls",
        ),
        &["protocol", "result"], // protocol: "chat", "responses"; result: "success", "failure"
    )
    .unwrap()
});

/// Provider calls aborted by the client-side deadline.
pub static PROVIDER_TIMEOUTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "songsmith_provider_timeouts_total",
        "Total provider calls that hit the deadline",
    )
    .unwrap()
});

// =============================================================================
// Approval and notifications
// =============================================================================

/// Approval attempts by result.
pub static APPROVALS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("songsmith_approvals_total", "Total lyric approval attempts"),
        &["result"], // "approved", "rejected"
    )
    .unwrap()
});

/// Push deliveries by result.
pub static NOTIFICATION_DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "songsmith_notification_deliveries_total",
            "Total push deliveries",
        ),
        &["result"], // "delivered", "failed"
    )
    .unwrap()
});

/// Endpoints deactivated after a failed delivery.
pub static ENDPOINTS_DEACTIVATED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "songsmith_endpoints_deactivated_total",
        "Total push endpoints deactivated",
    )
    .unwrap()
});

// =============================================================================
// Recovery
// =============================================================================

/// Recovery sweeps run.
pub static RECOVERY_SWEEPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("songsmith_recovery_sweeps_total", "Total recovery sweeps").unwrap()
});

/// Orders visited by recovery sweeps, by outcome.
pub static RECOVERY_ORDERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "songsmith_recovery_orders_total",
            "Total orders processed by recovery sweeps",
        ),
        &["result"], // "repaired", "skipped", "failed"
    )
    .unwrap()
});

// =============================================================================
// Event log
// =============================================================================

/// Events appended to the log, by event type.
pub static EVENTS_WRITTEN_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("songsmith_events_written_total", "Total events appended to the log"),
        &["event_type"],
    )
    .unwrap()
});

/// Events that never reached the log.
pub static EVENTS_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("songsmith_events_dropped_total", "Total events lost before storage"),
        &["reason"], // "channel_full", "channel_closed", "insert_failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ORDER_TRANSITIONS_TOTAL.clone()),
        // Generation
        Box::new(LYRIC_GENERATIONS_TOTAL.clone()),
        Box::new(LYRIC_GENERATION_DURATION.clone()),
        Box::new(MODERATION_REJECTIONS_TOTAL.clone()),
        Box::new(PROVIDER_CALLS_TOTAL.clone()),
        Box::new(PROVIDER_TIMEOUTS_TOTAL.clone()),
        // Approval and notifications
        Box::new(APPROVALS_TOTAL.clone()),
        Box::new(NOTIFICATION_DELIVERIES_TOTAL.clone()),
        Box::new(ENDPOINTS_DEACTIVATED_TOTAL.clone()),
        // Recovery
        Box::new(RECOVERY_SWEEPS_TOTAL.clone()),
        Box::new(RECOVERY_ORDERS_TOTAL.clone()),
        // Event log
        Box::new(EVENTS_WRITTEN_TOTAL.clone()),
        Box::new(EVENTS_DROPPED_TOTAL.clone()),
    ]
}
