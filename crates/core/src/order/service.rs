//! Order intake and the external trigger boundary.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::state::OrderTrigger;
use super::store::{CreateOrderRequest, OrderError, OrderFilter, OrderStore, TransitionRecord};
use super::types::{Lyric, Order, OrderStatus, Track};
use crate::events::{EventHandle, OrderEvent};
use crate::lyrics::LyricsPipeline;
use crate::metrics;
use crate::moderation::ContentModerator;
use crate::notify::NotificationDispatcher;

/// Shortest song that can be ordered, in seconds.
pub const MIN_DURATION_SECS: u32 = 30;
/// Longest song that can be ordered, in seconds.
pub const MAX_DURATION_SECS: u32 = 600;
/// Longest accepted story, in characters.
pub const MAX_STORY_CHARS: usize = 5000;

/// An order with everything attached to it.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetails {
    #[serde(flatten)]
    pub order: Order,
    pub lyrics: Vec<Lyric>,
    pub track: Option<Track>,
}

/// Creates orders and applies externally delivered triggers
/// (payment confirmation, production progress).
///
/// With a pipeline attached, a confirmed payment starts lyric generation in
/// the background. Failures there are left to the recovery sweep.
pub struct OrderService {
    store: Arc<dyn OrderStore>,
    moderator: Arc<ContentModerator>,
    events: Option<EventHandle>,
    notifier: Option<Arc<NotificationDispatcher>>,
    pipeline: Option<Arc<LyricsPipeline>>,
}

impl OrderService {
    pub fn new(store: Arc<dyn OrderStore>, moderator: Arc<ContentModerator>) -> Self {
        Self {
            store,
            moderator,
            events: None,
            notifier: None,
            pipeline: None,
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

    pub fn with_pipeline(mut self, pipeline: Arc<LyricsPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    /// Validate and moderate a brief, then store it as a `Draft` order.
    pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order, OrderError> {
        let request = validate_request(request)?;

        let terms = self.moderator.scan(&request.story);
        if !terms.is_empty() {
            metrics::MODERATION_REJECTIONS_TOTAL.inc();
            warn!(owner_id = %request.owner_id, terms = ?terms, "Order brief rejected by moderation");
            return Err(OrderError::ContentRejected(terms));
        }

        let order = self.store.create(request)?;
        info!(order_id = %order.id, owner_id = %order.owner_id, "Order created");

        if let Some(ref events) = self.events {
            events
                .emit(OrderEvent::OrderCreated {
                    order_id: order.id.clone(),
                    owner_id: order.owner_id.clone(),
                    occasion: order.occasion.clone(),
                    style: order.style.clone(),
                    price_cents: order.price_cents,
                })
                .await;
        }

        Ok(order)
    }

    pub fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        self.store
            .get(order_id)?
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }

    /// The order with its lyrics and track.
    pub fn get_details(&self, order_id: &str) -> Result<OrderDetails, OrderError> {
        let order = self.get(order_id)?;
        let lyrics = self.store.lyrics_for_order(order_id)?;
        let track = self.store.track_for_order(order_id)?;
        Ok(OrderDetails {
            order,
            lyrics,
            track,
        })
    }

    /// Orders matching the filter plus the total count ignoring pagination.
    pub fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, i64), OrderError> {
        let orders = self.store.list(filter)?;
        let total = self.store.count(filter)?;
        Ok((orders, total))
    }

    /// Fire an external trigger. Re-firing a trigger at its target is a no-op.
    ///
    /// Lyric and approval triggers are rejected with
    /// [`OrderError::Validation`]: they only fire through the pipeline and the
    /// approval service, together with the rows they describe.
    pub async fn fire(
        &self,
        order_id: &str,
        trigger: OrderTrigger,
    ) -> Result<TransitionRecord, OrderError> {
        if !trigger.is_external() {
            return Err(OrderError::Validation(format!(
                "{} cannot be delivered as an external trigger",
                trigger
            )));
        }

        let record = self.store.apply_trigger(order_id, trigger)?;
        announce_transition(self.events.as_ref(), self.notifier.as_ref(), &record).await;

        if record.trigger == OrderTrigger::PaymentConfirmed && record.transition.is_changed() {
            self.spawn_generation(&record.order.id);
        }

        Ok(record)
    }

    fn spawn_generation(&self, order_id: &str) {
        let Some(pipeline) = self.pipeline.clone() else {
            return;
        };
        let order_id = order_id.to_string();
        tokio::spawn(async move {
            // The pipeline logs and records failures itself.
            if let Ok(outcome) = pipeline.generate_lyrics(&order_id).await {
                debug!(order_id = %order_id, generated = outcome.is_generated(), "Generation after payment finished");
            }
        });
    }

    /// Move an order to `target` using the trigger that leads there.
    pub async fn advance_to(
        &self,
        order_id: &str,
        target: OrderStatus,
    ) -> Result<TransitionRecord, OrderError> {
        let trigger = OrderTrigger::for_target(target).ok_or_else(|| {
            OrderError::Validation(format!("No trigger leads to status {}", target))
        })?;
        self.fire(order_id, trigger).await
    }
}

/// Publish a stored transition: metrics, event log entries and the owner's
/// status notification. Unchanged transitions publish nothing.
pub(crate) async fn announce_transition(
    events: Option<&EventHandle>,
    notifier: Option<&Arc<NotificationDispatcher>>,
    record: &TransitionRecord,
) {
    let (from, to) = match record.transition {
        super::Transition::Changed { from, to } => (from, to),
        super::Transition::Unchanged(_) => return,
    };

    metrics::ORDER_TRANSITIONS_TOTAL
        .with_label_values(&[to.as_str()])
        .inc();
    info!(
        order_id = %record.order.id,
        from = %from,
        to = %to,
        trigger = %record.trigger,
        "Order status changed"
    );

    if let Some(events) = events {
        events
            .emit(OrderEvent::OrderStatusChanged {
                order_id: record.order.id.clone(),
                from,
                to,
                trigger: record.trigger,
            })
            .await;

        if record.trigger == OrderTrigger::PaymentConfirmed {
            events
                .emit(OrderEvent::PaymentConfirmed {
                    order_id: record.order.id.clone(),
                })
                .await;
        }
    }

    if let Some(notifier) = notifier {
        notifier.spawn_status_notification(record.order.clone());
    }
}

fn validate_request(request: CreateOrderRequest) -> Result<CreateOrderRequest, OrderError> {
    let request = CreateOrderRequest {
        owner_id: request.owner_id.trim().to_string(),
        occasion: request.occasion.trim().to_string(),
        style: request.style.trim().to_string(),
        tone: request.tone.trim().to_string(),
        story: request.story.trim().to_string(),
        ..request
    };

    for (field, value) in [
        ("owner_id", &request.owner_id),
        ("occasion", &request.occasion),
        ("style", &request.style),
        ("tone", &request.tone),
        ("story", &request.story),
    ] {
        if value.is_empty() {
            return Err(OrderError::Validation(format!("{} is required", field)));
        }
    }

    if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&request.duration_secs) {
        return Err(OrderError::Validation(format!(
            "duration_secs must be between {} and {}",
            MIN_DURATION_SECS, MAX_DURATION_SECS
        )));
    }

    if request.price_cents < 0 {
        return Err(OrderError::Validation(
            "price_cents cannot be negative".to_string(),
        ));
    }

    if request.story.chars().count() > MAX_STORY_CHARS {
        return Err(OrderError::Validation(format!(
            "story cannot exceed {} characters",
            MAX_STORY_CHARS
        )));
    }

    Ok(request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{create_event_log, EventStore, SqliteEventStore};
    use crate::moderation::ModerationConfig;
    use crate::order::{PaymentStatus, SqliteOrderStore, Transition};
    use crate::testing::{fixtures, MockProvider};

    fn service() -> OrderService {
        OrderService::new(
            Arc::new(SqliteOrderStore::in_memory().unwrap()),
            Arc::new(ContentModerator::new(&ModerationConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_create_order_starts_in_draft() {
        let service = service();
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Draft);
        assert_eq!(order.payment_status, PaymentStatus::Unpaid);
    }

    #[tokio::test]
    async fn test_create_order_trims_and_validates() {
        let service = service();

        let mut request = fixtures::order_request("user-1");
        request.occasion = "   ".to_string();
        assert!(matches!(
            service.create_order(request).await,
            Err(OrderError::Validation(msg)) if msg.contains("occasion")
        ));

        let mut request = fixtures::order_request("user-1");
        request.duration_secs = 5;
        assert!(matches!(
            service.create_order(request).await,
            Err(OrderError::Validation(_))
        ));

        let mut request = fixtures::order_request("user-1");
        request.story = "x".repeat(MAX_STORY_CHARS + 1);
        assert!(matches!(
            service.create_order(request).await,
            Err(OrderError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_order_rejects_disallowed_story() {
        let service = service();
        let mut request = fixtures::order_request("user-1");
        request.story = "My boss is a total bastard".to_string();

        let result = service.create_order(request).await;
        assert!(matches!(result, Err(OrderError::ContentRejected(terms)) if terms == vec!["bastard".to_string()]));
        assert_eq!(service.store().count(&OrderFilter::new()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_advance_to_paid_marks_payment_and_logs_events() {
        let event_store = Arc::new(SqliteEventStore::in_memory().unwrap());
        let (events, writer) = create_event_log(event_store.clone(), 16);
        let writer_task = tokio::spawn(writer.run());

        let service = service().with_events(events);
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();
        service
            .fire(&order.id, OrderTrigger::SubmitForPayment)
            .await
            .unwrap();
        let record = service
            .advance_to(&order.id, OrderStatus::Paid)
            .await
            .unwrap();

        assert_eq!(
            record.transition,
            Transition::Changed {
                from: OrderStatus::AwaitingPayment,
                to: OrderStatus::Paid
            }
        );
        assert_eq!(record.order.payment_status, PaymentStatus::Paid);

        drop(service);
        writer_task.await.unwrap();

        let types: Vec<String> = event_store
            .order_history(&order.id)
            .unwrap()
            .into_iter()
            .map(|r| r.event_type)
            .collect();
        assert_eq!(
            types,
            vec![
                "ORDER_CREATED",
                "ORDER_STATUS_CHANGED",
                "ORDER_STATUS_CHANGED",
                "PAYMENT_CONFIRMED"
            ]
        );
    }

    #[tokio::test]
    async fn test_refire_is_noop() {
        let service = service();
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();

        service
            .fire(&order.id, OrderTrigger::SubmitForPayment)
            .await
            .unwrap();
        let again = service
            .fire(&order.id, OrderTrigger::SubmitForPayment)
            .await
            .unwrap();

        assert!(!again.transition.is_changed());
    }

    #[tokio::test]
    async fn test_advance_to_draft_is_validation_error() {
        let service = service();
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();

        let result = service.advance_to(&order.id, OrderStatus::Draft).await;
        assert!(matches!(result, Err(OrderError::Validation(_))));
    }

    #[tokio::test]
    async fn test_skipping_payment_is_invalid_transition() {
        let service = service();
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();

        let result = service.advance_to(&order.id, OrderStatus::Paid).await;
        assert!(matches!(result, Err(OrderError::InvalidTransition { .. })));
        assert_eq!(service.get(&order.id).unwrap().status, OrderStatus::Draft);
    }

    #[tokio::test]
    async fn test_internal_targets_are_rejected() {
        let service = service();
        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();
        service
            .fire(&order.id, OrderTrigger::SubmitForPayment)
            .await
            .unwrap();
        service
            .fire(&order.id, OrderTrigger::PaymentConfirmed)
            .await
            .unwrap();

        for target in [
            OrderStatus::LyricsPending,
            OrderStatus::LyricsGenerated,
            OrderStatus::Approved,
        ] {
            let result = service.advance_to(&order.id, target).await;
            assert!(
                matches!(result, Err(OrderError::Validation(_))),
                "{} should be rejected, got {:?}",
                target,
                result
            );
        }

        let order = service.get(&order.id).unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
        assert_eq!(service.store().lyric_count(&order.id).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_payment_starts_generation_when_pipeline_attached() {
        let store = Arc::new(SqliteOrderStore::in_memory().unwrap());
        let moderator = Arc::new(ContentModerator::new(&ModerationConfig::default()));
        let provider = Arc::new(MockProvider::with_text(fixtures::TWO_DRAFTS));
        let pipeline = Arc::new(LyricsPipeline::new(
            store.clone(),
            provider.clone(),
            moderator.clone(),
        ));
        let service = OrderService::new(store.clone(), moderator).with_pipeline(pipeline);

        let order = service
            .create_order(fixtures::order_request("user-1"))
            .await
            .unwrap();
        service
            .fire(&order.id, OrderTrigger::SubmitForPayment)
            .await
            .unwrap();
        service
            .fire(&order.id, OrderTrigger::PaymentConfirmed)
            .await
            .unwrap();

        let mut generated = false;
        for _ in 0..50 {
            if store.lyric_count(&order.id).unwrap() == 2 {
                generated = true;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(generated);
        assert_eq!(
            service.get(&order.id).unwrap().status,
            OrderStatus::LyricsGenerated
        );
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_get_details_missing_order() {
        let service = service();
        assert!(matches!(
            service.get_details("missing"),
            Err(OrderError::NotFound(_))
        ));
    }
}
