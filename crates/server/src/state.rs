use std::sync::Arc;

use songsmith_core::events::{EventHandle, EventStore};
use songsmith_core::generation::GenerationProvider;
use songsmith_core::notify::{
    EndpointRegistry, NotificationDispatcher, NotificationLogStore, PushTransport,
};
use songsmith_core::{
    ApprovalService, Config, ContentModerator, LyricsPipeline, OrderService, OrderStore,
    RecoverySweep, SanitizedConfig,
};

/// Shared application state
pub struct AppState {
    config: Config,
    orders: OrderService,
    pipeline: Arc<LyricsPipeline>,
    approvals: ApprovalService,
    recovery: RecoverySweep,
    event_store: Arc<dyn EventStore>,
    endpoints: Arc<dyn EndpointRegistry>,
    notification_log: Arc<dyn NotificationLogStore>,
}

impl AppState {
    /// Wire every component on top of the given stores and outbound clients.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        order_store: Arc<dyn OrderStore>,
        events: EventHandle,
        event_store: Arc<dyn EventStore>,
        endpoints: Arc<dyn EndpointRegistry>,
        notification_log: Arc<dyn NotificationLogStore>,
        provider: Arc<dyn GenerationProvider>,
        transport: Arc<dyn PushTransport>,
    ) -> Self {
        let moderator = Arc::new(ContentModerator::new(&config.moderation));
        let notifier = Arc::new(NotificationDispatcher::new(
            Arc::clone(&endpoints),
            transport,
            Arc::clone(&notification_log),
            config.notifications.clone(),
        ));

        let pipeline = Arc::new(
            LyricsPipeline::new(Arc::clone(&order_store), provider, Arc::clone(&moderator))
                .with_sampling(&config.generation)
                .with_events(events.clone())
                .with_notifier(Arc::clone(&notifier)),
        );

        let mut orders = OrderService::new(Arc::clone(&order_store), moderator)
            .with_events(events.clone())
            .with_notifier(Arc::clone(&notifier));
        if config.generation.on_payment {
            orders = orders.with_pipeline(Arc::clone(&pipeline));
        }

        let approvals = ApprovalService::new(Arc::clone(&order_store))
            .with_events(events.clone())
            .with_notifier(notifier);

        let recovery = RecoverySweep::new(
            config.recovery.clone(),
            order_store,
            Arc::clone(&pipeline),
        )
        .with_events(events);

        Self {
            config,
            orders,
            pipeline,
            approvals,
            recovery,
            event_store,
            endpoints,
            notification_log,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn pipeline(&self) -> &LyricsPipeline {
        &self.pipeline
    }

    pub fn approvals(&self) -> &ApprovalService {
        &self.approvals
    }

    pub fn recovery(&self) -> &RecoverySweep {
        &self.recovery
    }

    pub fn event_store(&self) -> &dyn EventStore {
        self.event_store.as_ref()
    }

    pub fn endpoints(&self) -> &dyn EndpointRegistry {
        self.endpoints.as_ref()
    }

    pub fn notification_log(&self) -> &dyn NotificationLogStore {
        self.notification_log.as_ref()
    }
}
