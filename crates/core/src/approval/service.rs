use std::sync::Arc;

use tracing::{info, warn};

use crate::events::{EventHandle, OrderEvent};
use crate::metrics;
use crate::notify::NotificationDispatcher;
use crate::order::{
    announce_transition, ApprovalRecord, Lyric, Order, OrderError, OrderStore, ProductionMetadata,
};

/// Style prompt handed to the audio renderer.
pub fn style_prompt(order: &Order) -> String {
    format!(
        "{} song, {} mood, written for a {}, about {} seconds long",
        order.style, order.tone, order.occasion, order.duration_secs
    )
}

/// Production metadata for an order once `lyric` is approved.
pub fn production_metadata(order: &Order, lyric: &Lyric) -> ProductionMetadata {
    ProductionMetadata {
        title: Some(lyric.title.clone()),
        style_prompt: Some(style_prompt(order)),
        cover_url: order.production.cover_url.clone(),
    }
}

/// Approves one lyric draft of an order and queues its track.
pub struct ApprovalService {
    store: Arc<dyn OrderStore>,
    events: Option<EventHandle>,
    notifier: Option<Arc<NotificationDispatcher>>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self {
            store,
            events: None,
            notifier: None,
        }
    }

    pub fn with_events(mut self, events: EventHandle) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Approve `lyric_id` on behalf of `user_id`.
    ///
    /// Missing and foreign orders or lyrics are both reported as
    /// [`OrderError::NotFoundOrForbidden`]. A second approval on the same order
    /// fails with [`OrderError::AlreadyApproved`]. Failures write nothing.
    pub async fn approve_lyric(
        &self,
        user_id: &str,
        order_id: &str,
        lyric_id: &str,
    ) -> Result<ApprovalRecord, OrderError> {
        let result = self.approve(user_id, order_id, lyric_id).await;

        let label = if result.is_ok() { "approved" } else { "rejected" };
        metrics::APPROVALS_TOTAL.with_label_values(&[label]).inc();

        if let Err(ref e) = result {
            warn!(order_id = %order_id, lyric_id = %lyric_id, error = %e, "Lyric approval failed");
        }
        result
    }

    async fn approve(
        &self,
        user_id: &str,
        order_id: &str,
        lyric_id: &str,
    ) -> Result<ApprovalRecord, OrderError> {
        for (field, value) in [
            ("user_id", user_id),
            ("order_id", order_id),
            ("lyric_id", lyric_id),
        ] {
            if value.trim().is_empty() {
                return Err(OrderError::Validation(format!("{} is required", field)));
            }
        }

        let order = self
            .store
            .get(order_id)?
            .filter(|order| order.owner_id == user_id)
            .ok_or_else(|| OrderError::NotFoundOrForbidden(order_id.to_string()))?;

        let lyric = self
            .store
            .get_lyric(lyric_id)?
            .filter(|lyric| lyric.order_id == order.id)
            .ok_or_else(|| OrderError::NotFoundOrForbidden(lyric_id.to_string()))?;

        // The store repeats both ownership checks inside its transaction.
        let production = production_metadata(&order, &lyric);
        let record = self
            .store
            .approve_lyric(user_id, order_id, lyric_id, production)?;

        info!(
            order_id = %order_id,
            lyric_id = %record.lyric.id,
            version = record.lyric.version,
            track_id = %record.track.id,
            "Lyric approved, track queued"
        );

        if let Some(ref events) = self.events {
            events
                .emit(OrderEvent::LyricApproved {
                    order_id: order_id.to_string(),
                    user_id: user_id.to_string(),
                    lyric_id: record.lyric.id.clone(),
                    lyric_version: record.lyric.version,
                    track_id: record.track.id.clone(),
                })
                .await;
        }
        announce_transition(
            self.events.as_ref(),
            self.notifier.as_ref(),
            &record.transition,
        )
        .await;

        Ok(record)
    }
}
