use chrono::{DateTime, Utc};
use tokio::sync::mpsc::{self, error::TrySendError};

use super::OrderEvent;
use crate::metrics::EVENTS_DROPPED_TOTAL;

/// Envelope wrapping an event with the time it was emitted
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: OrderEvent,
}

/// Handle for appending to the event log
///
/// Cheaply cloneable. Events travel through a bounded channel to the [`EventWriter`](super::EventWriter).
/// Emitting never fails the caller: lost events are logged and counted in
/// `songsmith_events_dropped_total`.
#[derive(Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event, waiting for channel capacity
    pub async fn emit(&self, event: OrderEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            dropped(&e.0.event, "channel_closed");
        }
    }

    /// Try to emit an event without waiting
    ///
    /// Returns true if the event was queued.
    pub fn try_emit(&self, event: OrderEvent) -> bool {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(TrySendError::Full(envelope)) => {
                dropped(&envelope.event, "channel_full");
                false
            }
            Err(TrySendError::Closed(envelope)) => {
                dropped(&envelope.event, "channel_closed");
                false
            }
        }
    }
}

fn dropped(event: &OrderEvent, reason: &str) {
    EVENTS_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    tracing::error!(
        event_type = event.event_type(),
        order_id = event.order_id().unwrap_or("-"),
        reason,
        "Event dropped before reaching the log"
    );
}
