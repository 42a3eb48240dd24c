//! Mock push transport for testing.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::notify::{DeliveryError, PushEndpoint, PushPayload, PushTransport};

/// Mock implementation of [`PushTransport`].
///
/// Records successful deliveries as `(url, payload)` pairs. URLs marked with
/// [`fail_url`](Self::fail_url) are rejected with status 410.
#[derive(Default)]
pub struct MockPushTransport {
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Option<Duration>>,
    deliveries: Mutex<Vec<(String, PushPayload)>>,
    attempts: Mutex<usize>,
}

impl MockPushTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every delivery to `url`.
    pub fn fail_url(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Delivery attempts so far, failed ones included.
    pub fn delivery_count(&self) -> usize {
        *self.attempts.lock().unwrap()
    }

    /// Successful deliveries in completion order.
    pub fn deliveries(&self) -> Vec<(String, PushPayload)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl PushTransport for MockPushTransport {
    async fn deliver(
        &self,
        endpoint: &PushEndpoint,
        payload: &PushPayload,
    ) -> Result<(), DeliveryError> {
        *self.attempts.lock().unwrap() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(&endpoint.url) {
            return Err(DeliveryError::Rejected(410));
        }

        self.deliveries
            .lock()
            .unwrap()
            .push((endpoint.url.clone(), payload.clone()));
        Ok(())
    }
}
