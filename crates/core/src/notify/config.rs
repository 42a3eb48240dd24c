use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Notification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// When false, status changes send nothing.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-endpoint delivery deadline.
    #[serde(default = "default_delivery_timeout_ms")]
    pub delivery_timeout_ms: u64,

    /// Public site URL used to build order links in payloads.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            delivery_timeout_ms: default_delivery_timeout_ms(),
            base_url: None,
        }
    }
}

impl NotificationConfig {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }

    /// Link to an order page, if a base URL is configured.
    pub fn order_url(&self, order_id: &str) -> Option<String> {
        self.base_url
            .as_deref()
            .map(|base| format!("{}/orders/{}", base.trim_end_matches('/'), order_id))
    }
}

fn default_enabled() -> bool {
    true
}

fn default_delivery_timeout_ms() -> u64 {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_url() {
        let mut config = NotificationConfig::default();
        assert_eq!(config.order_url("o-1"), None);

        config.base_url = Some("https://songs.example.com/".to_string());
        assert_eq!(
            config.order_url("o-1").as_deref(),
            Some("https://songs.example.com/orders/o-1")
        );
    }
}
