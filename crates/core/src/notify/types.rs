use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered push destination.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushEndpoint {
    pub id: String,
    pub recipient_id: String,
    /// Opaque delivery target (a webhook URL for the built-in transport).
    pub url: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deactivated_at: Option<DateTime<Utc>>,
    /// Error that caused deactivation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// One dispatch call.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationRequest {
    /// Deliver only to this recipient's endpoints; `None` broadcasts to all.
    pub recipient_id: Option<String>,
    pub order_id: Option<String>,
    pub title: String,
    pub body: String,
    pub url: Option<String>,
}

impl NotificationRequest {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            recipient_id: None,
            order_id: None,
            title: title.into(),
            body: body.into(),
            url: None,
        }
    }

    pub fn for_recipient(mut self, recipient_id: impl Into<String>) -> Self {
        self.recipient_id = Some(recipient_id.into());
        self
    }

    pub fn for_order(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_url(mut self, url: Option<String>) -> Self {
        self.url = url;
        self
    }

    pub fn payload(&self) -> PushPayload {
        PushPayload {
            title: self.title.clone(),
            body: self.body.clone(),
            url: self.url.clone(),
            order_id: self.order_id.clone(),
        }
    }
}

/// JSON body delivered to each endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// Aggregate result of one dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStatus {
    /// No active endpoint matched.
    NoEndpoints,
    /// Every endpoint accepted the payload.
    Delivered,
    /// Some endpoints failed.
    Partial,
    /// Every endpoint failed, or endpoints could not be resolved.
    Failed,
}

impl DispatchStatus {
    pub fn from_counts(delivered: u32, failed: u32) -> Self {
        match (delivered, failed) {
            (0, 0) => DispatchStatus::NoEndpoints,
            (_, 0) => DispatchStatus::Delivered,
            (0, _) => DispatchStatus::Failed,
            _ => DispatchStatus::Partial,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchStatus::NoEndpoints => "no_endpoints",
            DispatchStatus::Delivered => "delivered",
            DispatchStatus::Partial => "partial",
            DispatchStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for DispatchStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no_endpoints" => Ok(DispatchStatus::NoEndpoints),
            "delivered" => Ok(DispatchStatus::Delivered),
            "partial" => Ok(DispatchStatus::Partial),
            "failed" => Ok(DispatchStatus::Failed),
            other => Err(format!("Unknown dispatch status: {}", other)),
        }
    }
}

/// What a dispatch call did.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DispatchSummary {
    pub status: DispatchStatus,
    pub delivered: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

/// Stored record of one dispatch call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationLogEntry {
    pub id: i64,
    pub order_id: Option<String>,
    pub recipient_id: Option<String>,
    pub title: String,
    pub body: String,
    pub status: DispatchStatus,
    pub success_count: u32,
    pub failure_count: u32,
    /// Per-endpoint error strings, if any.
    #[serde(default)]
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
}
