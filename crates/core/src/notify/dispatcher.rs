use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use super::{
    status_message, DeliveryError, DispatchStatus, DispatchSummary, EndpointRegistry,
    NotificationConfig, NotificationLogEntry, NotificationLogStore, NotificationRequest,
    PushEndpoint, PushTransport,
};
use crate::metrics;
use crate::order::Order;

/// Fans notifications out to registered endpoints.
///
/// Dispatch never returns an error: failures are logged, counted in the
/// summary and written to the notification log.
pub struct NotificationDispatcher {
    registry: Arc<dyn EndpointRegistry>,
    transport: Arc<dyn PushTransport>,
    log: Arc<dyn NotificationLogStore>,
    config: NotificationConfig,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<dyn EndpointRegistry>,
        transport: Arc<dyn PushTransport>,
        log: Arc<dyn NotificationLogStore>,
        config: NotificationConfig,
    ) -> Self {
        Self {
            registry,
            transport,
            log,
            config,
        }
    }

    /// Deliver to every active endpoint of the recipient (or of everyone),
    /// concurrently, each bounded by the delivery timeout.
    ///
    /// Endpoints that fail are deactivated. Exactly one log entry is written.
    pub async fn notify(&self, request: NotificationRequest) -> DispatchSummary {
        let summary = match self
            .registry
            .active_endpoints(request.recipient_id.as_deref())
        {
            Ok(endpoints) => self.deliver_all(&request, endpoints).await,
            Err(e) => {
                error!(
                    recipient_id = ?request.recipient_id,
                    error = %e,
                    "Failed to resolve push endpoints"
                );
                DispatchSummary {
                    status: DispatchStatus::Failed,
                    delivered: 0,
                    failed: 0,
                    errors: vec![format!("endpoint lookup failed: {}", e)],
                }
            }
        };

        self.record(&request, &summary);
        summary
    }

    /// Send the templated message for the order's current status.
    ///
    /// Returns `None` when notifications are disabled or the status has no
    /// template.
    pub async fn notify_status(&self, order: &Order) -> Option<DispatchSummary> {
        if !self.config.enabled {
            return None;
        }

        let message = status_message(order.status, order.production.title.as_deref())?;
        let request = NotificationRequest::new(message.title, message.body)
            .for_recipient(order.owner_id.clone())
            .for_order(order.id.clone())
            .with_url(self.config.order_url(&order.id));

        Some(self.notify(request).await)
    }

    /// Fire-and-forget variant of [`notify_status`](Self::notify_status).
    pub fn spawn_status_notification(self: &Arc<Self>, order: Order) {
        if !self.config.enabled || status_message(order.status, None).is_none() {
            return;
        }

        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            if let Some(summary) = dispatcher.notify_status(&order).await {
                debug!(
                    order_id = %order.id,
                    status = %order.status,
                    delivered = summary.delivered,
                    failed = summary.failed,
                    "Status notification dispatched"
                );
            }
        });
    }

    async fn deliver_all(
        &self,
        request: &NotificationRequest,
        endpoints: Vec<PushEndpoint>,
    ) -> DispatchSummary {
        let payload = request.payload();
        let timeout = self.config.delivery_timeout();

        let attempts = endpoints.iter().map(|endpoint| {
            let payload = &payload;
            async move {
                let result =
                    match tokio::time::timeout(timeout, self.transport.deliver(endpoint, payload))
                        .await
                    {
                        Ok(result) => result,
                        Err(_) => Err(DeliveryError::Timeout),
                    };
                (endpoint, result)
            }
        });

        let mut delivered = 0u32;
        let mut failed = 0u32;
        let mut errors = Vec::new();

        for (endpoint, result) in join_all(attempts).await {
            match result {
                Ok(()) => {
                    delivered += 1;
                    metrics::NOTIFICATION_DELIVERIES_TOTAL
                        .with_label_values(&["delivered"])
                        .inc();
                }
                Err(e) => {
                    failed += 1;
                    metrics::NOTIFICATION_DELIVERIES_TOTAL
                        .with_label_values(&["failed"])
                        .inc();
                    warn!(
                        endpoint_id = %endpoint.id,
                        recipient_id = %endpoint.recipient_id,
                        error = %e,
                        "Push delivery failed, deactivating endpoint"
                    );
                    errors.push(format!("endpoint {}: {}", endpoint.id, e));
                    self.deactivate(endpoint, &e.to_string(), &mut errors);
                }
            }
        }

        DispatchSummary {
            status: DispatchStatus::from_counts(delivered, failed),
            delivered,
            failed,
            errors,
        }
    }

    fn deactivate(&self, endpoint: &PushEndpoint, reason: &str, errors: &mut Vec<String>) {
        match self.registry.deactivate(&endpoint.id, reason) {
            Ok(()) => {
                metrics::ENDPOINTS_DEACTIVATED_TOTAL.inc();
                info!(endpoint_id = %endpoint.id, "Push endpoint deactivated");
            }
            Err(e) => {
                error!(endpoint_id = %endpoint.id, error = %e, "Failed to deactivate endpoint");
                errors.push(format!("endpoint {}: deactivation failed: {}", endpoint.id, e));
            }
        }
    }

    fn record(&self, request: &NotificationRequest, summary: &DispatchSummary) {
        let entry = NotificationLogEntry {
            id: 0,
            order_id: request.order_id.clone(),
            recipient_id: request.recipient_id.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            status: summary.status,
            success_count: summary.delivered,
            failure_count: summary.failed,
            errors: summary.errors.clone(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.log.insert(&entry) {
            error!(order_id = ?request.order_id, error = %e, "Failed to write notification log");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::{NotificationFilter, SqliteEndpointRegistry, SqliteNotificationLog};
    use crate::order::OrderStatus;
    use crate::testing::{fixtures, MockPushTransport};

    struct Fixture {
        registry: Arc<SqliteEndpointRegistry>,
        transport: Arc<MockPushTransport>,
        log: Arc<SqliteNotificationLog>,
        dispatcher: Arc<NotificationDispatcher>,
    }

    fn fixture(config: NotificationConfig) -> Fixture {
        let registry = Arc::new(SqliteEndpointRegistry::in_memory().unwrap());
        let transport = Arc::new(MockPushTransport::new());
        let log = Arc::new(SqliteNotificationLog::in_memory().unwrap());
        let dispatcher = Arc::new(NotificationDispatcher::new(
            registry.clone(),
            transport.clone(),
            log.clone(),
            config,
        ));
        Fixture {
            registry,
            transport,
            log,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn test_failed_endpoint_is_deactivated_and_logged() {
        let f = fixture(NotificationConfig::default());
        let good = f.registry.register("user-1", "https://push.test/good").unwrap();
        let bad = f.registry.register("user-1", "https://push.test/bad").unwrap();
        f.transport.fail_url(&bad.url);

        let summary = f
            .dispatcher
            .notify(NotificationRequest::new("Hi", "There").for_recipient("user-1"))
            .await;

        assert_eq!(summary.status, DispatchStatus::Partial);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.failed, 1);

        let active = f.registry.active_endpoints(Some("user-1")).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, good.id);

        let entries = f.log.query(&NotificationFilter::new()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].success_count, 1);
        assert_eq!(entries[0].failure_count, 1);
        assert!(entries[0].errors[0].contains(&bad.id));
    }

    #[tokio::test]
    async fn test_deactivated_endpoint_is_skipped_next_time() {
        let f = fixture(NotificationConfig::default());
        let bad = f.registry.register("user-1", "https://push.test/bad").unwrap();
        f.transport.fail_url(&bad.url);

        f.dispatcher
            .notify(NotificationRequest::new("One", "1").for_recipient("user-1"))
            .await;
        let second = f
            .dispatcher
            .notify(NotificationRequest::new("Two", "2").for_recipient("user-1"))
            .await;

        assert_eq!(second.status, DispatchStatus::NoEndpoints);
        assert_eq!(f.transport.delivery_count(), 1);
        assert_eq!(f.log.query(&NotificationFilter::new()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_no_recipient_broadcasts_to_everyone() {
        let f = fixture(NotificationConfig::default());
        f.registry.register("user-1", "https://push.test/a").unwrap();
        f.registry.register("user-2", "https://push.test/b").unwrap();

        let summary = f
            .dispatcher
            .notify(NotificationRequest::new("News", "Hello all"))
            .await;

        assert_eq!(summary.status, DispatchStatus::Delivered);
        assert_eq!(summary.delivered, 2);
    }

    #[tokio::test]
    async fn test_slow_endpoint_times_out() {
        let f = fixture(NotificationConfig {
            delivery_timeout_ms: 20,
            ..Default::default()
        });
        f.registry.register("user-1", "https://push.test/slow").unwrap();
        f.transport
            .set_delay(std::time::Duration::from_millis(500));

        let summary = f
            .dispatcher
            .notify(NotificationRequest::new("Hi", "There").for_recipient("user-1"))
            .await;

        assert_eq!(summary.status, DispatchStatus::Failed);
        assert!(summary.errors[0].contains("timed out"));
        assert!(f.registry.active_endpoints(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notify_status_uses_message_table() {
        let f = fixture(NotificationConfig {
            base_url: Some("https://songs.test".to_string()),
            ..Default::default()
        });
        f.registry.register("user-1", "https://push.test/a").unwrap();

        let mut order = fixtures::order(OrderStatus::MusicReady);
        order.production.title = Some("Sail Away".to_string());

        let summary = f.dispatcher.notify_status(&order).await.unwrap();
        assert_eq!(summary.delivered, 1);

        let sent = f.transport.deliveries();
        assert_eq!(sent[0].1.body, "\"Sail Away\" is ready to play.");
        assert_eq!(
            sent[0].1.url.as_deref(),
            Some(format!("https://songs.test/orders/{}", order.id).as_str())
        );

        let entries = f
            .log
            .query(&NotificationFilter::new().with_order_id(&order.id))
            .unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_unmapped_status_sends_nothing() {
        let f = fixture(NotificationConfig::default());
        f.registry.register("user-1", "https://push.test/a").unwrap();

        let order = fixtures::order(OrderStatus::Approved);
        assert!(f.dispatcher.notify_status(&order).await.is_none());
        assert!(f.log.query(&NotificationFilter::new()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_dispatcher_sends_nothing() {
        let f = fixture(NotificationConfig {
            enabled: false,
            ..Default::default()
        });
        f.registry.register("user-1", "https://push.test/a").unwrap();

        let order = fixtures::order(OrderStatus::Paid);
        assert!(f.dispatcher.notify_status(&order).await.is_none());
        assert_eq!(f.transport.delivery_count(), 0);
    }
}
