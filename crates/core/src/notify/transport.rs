use async_trait::async_trait;

use super::{PushEndpoint, PushPayload};

/// Why a single delivery failed.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(String),

    /// The endpoint answered with a non-success status.
    #[error("Endpoint rejected delivery with status {0}")]
    Rejected(u16),

    #[error("Delivery timed out")]
    Timeout,
}

/// Delivers a payload to one endpoint.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn deliver(
        &self,
        endpoint: &PushEndpoint,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError>;
}

/// Posts the payload as JSON to the endpoint URL.
pub struct WebhookPushTransport {
    client: reqwest::Client,
}

impl WebhookPushTransport {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for WebhookPushTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PushTransport for WebhookPushTransport {
    async fn deliver(
        &self,
        endpoint: &PushEndpoint,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&endpoint.url)
            .json(payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}
