//! Push notifications for order status changes.
//!
//! The [`NotificationDispatcher`] resolves active endpoints through an
//! [`EndpointRegistry`], delivers through a [`PushTransport`], deactivates
//! endpoints that fail, and records one [`NotificationLogEntry`] per dispatch.

mod config;
mod dispatcher;
mod log;
mod messages;
mod registry;
mod transport;
mod types;

pub use config::NotificationConfig;
pub use dispatcher::NotificationDispatcher;
pub use log::{NotificationFilter, NotificationLogStore, NotifyError, SqliteNotificationLog};
pub use messages::{status_message, StatusMessage};
pub use registry::{EndpointRegistry, RegistryError, SqliteEndpointRegistry};
pub use transport::{DeliveryError, PushTransport, WebhookPushTransport};
pub use types::{
    DispatchStatus, DispatchSummary, NotificationLogEntry, NotificationRequest, PushEndpoint,
    PushPayload,
};
