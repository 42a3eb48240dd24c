use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::order::{OrderStatus, OrderTrigger};

/// Event log entry types
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEvent {
    // System events
    ServiceStarted {
        version: String,
        config_hash: String,
    },
    ServiceStopped {
        reason: String,
    },

    // Order lifecycle
    OrderCreated {
        order_id: String,
        owner_id: String,
        occasion: String,
        style: String,
        price_cents: i64,
    },
    OrderStatusChanged {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
        trigger: OrderTrigger,
    },
    PaymentConfirmed {
        order_id: String,
    },

    // Lyric generation
    ContentRejected {
        order_id: String,
        terms: Vec<String>,
    },
    LyricsGenerated {
        order_id: String,
        lyric_ids: Vec<String>,
        /// Provider protocol that produced the text ("chat" or "responses")
        protocol: String,
        duration_ms: u64,
    },
    LyricsGenerationFailed {
        order_id: String,
        error: String,
        /// Whether a later sweep may succeed
        retryable: bool,
    },

    // Approval
    LyricApproved {
        order_id: String,
        user_id: String,
        lyric_id: String,
        lyric_version: u8,
        track_id: String,
    },

    // Recovery
    RecoverySweepCompleted {
        examined: usize,
        succeeded: usize,
        failed: usize,
    },
}

impl OrderEvent {
    /// Stored event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::ServiceStarted { .. } => "SERVICE_STARTED",
            Self::ServiceStopped { .. } => "SERVICE_STOPPED",
            Self::OrderCreated { .. } => "ORDER_CREATED",
            Self::OrderStatusChanged { .. } => "ORDER_STATUS_CHANGED",
            Self::PaymentConfirmed { .. } => "PAYMENT_CONFIRMED",
            Self::ContentRejected { .. } => "CONTENT_REJECTED",
            Self::LyricsGenerated { .. } => "LYRICS_GENERATED",
            Self::LyricsGenerationFailed { .. } => "LYRICS_GENERATION_FAILED",
            Self::LyricApproved { .. } => "LYRIC_APPROVED",
            Self::RecoverySweepCompleted { .. } => "RECOVERY_SWEEP_COMPLETED",
        }
    }

    /// The order this event refers to, if any
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { order_id, .. }
            | Self::OrderStatusChanged { order_id, .. }
            | Self::PaymentConfirmed { order_id }
            | Self::ContentRejected { order_id, .. }
            | Self::LyricsGenerated { order_id, .. }
            | Self::LyricsGenerationFailed { order_id, .. }
            | Self::LyricApproved { order_id, .. } => Some(order_id),
            _ => None,
        }
    }

    /// The user who caused this event, if known
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::OrderCreated { owner_id, .. } => Some(owner_id),
            Self::LyricApproved { user_id, .. } => Some(user_id),
            _ => None,
        }
    }
}

/// A stored event log record with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub order_id: Option<String>,
    pub user_id: Option<String>,
    pub data: OrderEvent,
}

impl EventRecord {
    /// Build an unsaved record, indexing the ids carried by the event.
    pub fn new(timestamp: DateTime<Utc>, event: OrderEvent) -> Self {
        Self {
            id: 0,
            timestamp,
            event_type: event.event_type().to_string(),
            order_id: event.order_id().map(String::from),
            user_id: event.user_id().map(String::from),
            data: event,
        }
    }
}
