//! Core order data types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a lyric title, in characters.
pub const MAX_TITLE_CHARS: usize = 120;

/// Error returned when a stored status string is not recognized.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Unknown {kind}: {value}")]
pub struct ParseStatusError {
    pub kind: &'static str,
    pub value: String,
}

/// Fulfillment status of an order.
///
/// State machine flow:
/// ```text
/// Draft -> AwaitingPayment -> Paid -> LyricsPending -> LyricsGenerated -> Approved
///
/// Approved -> MusicGenerating -> MusicReady -> Completed
/// ```
///
/// Transitions are driven by [`OrderTrigger`](super::OrderTrigger); see `state.rs`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Brief submitted, not yet sent to checkout.
    Draft,
    /// Checkout started, waiting for payment confirmation.
    AwaitingPayment,
    /// Payment confirmed, lyric generation not started.
    Paid,
    /// Lyric generation in progress (or waiting for a retry).
    LyricsPending,
    /// Two lyric drafts are available for review.
    LyricsGenerated,
    /// A draft was approved and a track is queued.
    Approved,
    /// Audio production in progress.
    MusicGenerating,
    /// Audio is ready for the customer.
    MusicReady,
    /// Order delivered (terminal).
    Completed,
}

impl OrderStatus {
    /// All statuses in pipeline order.
    pub const ALL: [OrderStatus; 9] = [
        OrderStatus::Draft,
        OrderStatus::AwaitingPayment,
        OrderStatus::Paid,
        OrderStatus::LyricsPending,
        OrderStatus::LyricsGenerated,
        OrderStatus::Approved,
        OrderStatus::MusicGenerating,
        OrderStatus::MusicReady,
        OrderStatus::Completed,
    ];

    /// Returns the status as stored and exposed over the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "DRAFT",
            OrderStatus::AwaitingPayment => "AWAITING_PAYMENT",
            OrderStatus::Paid => "PAID",
            OrderStatus::LyricsPending => "LYRICS_PENDING",
            OrderStatus::LyricsGenerated => "LYRICS_GENERATED",
            OrderStatus::Approved => "APPROVED",
            OrderStatus::MusicGenerating => "MUSIC_GENERATING",
            OrderStatus::MusicReady => "MUSIC_READY",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OrderStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError {
                kind: "order status",
                value: s.to_string(),
            })
    }
}

/// Payment state, tracked separately from the fulfillment status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            other => Err(ParseStatusError {
                kind: "payment status",
                value: other.to_string(),
            }),
        }
    }
}

/// Metadata handed to audio production once a lyric is approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ProductionMetadata {
    /// Song title (the approved lyric's title).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Style prompt for the audio renderer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_prompt: Option<String>,
    /// Cover art URL, filled in by production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
}

impl ProductionMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.style_prompt.is_none() && self.cover_url.is_none()
    }
}

/// A customer's request for a personalized song.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Unique identifier (UUID).
    pub id: String,

    /// User who placed the order.
    pub owner_id: String,

    /// What the song celebrates (birthday, wedding, ...).
    pub occasion: String,

    /// Musical style (pop, acoustic, ...).
    pub style: String,

    /// Emotional tone (romantic, funny, ...).
    pub tone: String,

    /// Target song length in seconds.
    pub duration_secs: u32,

    /// The customer's story, embedded into the lyric prompt.
    pub story: String,

    /// Price in minor currency units.
    pub price_cents: i64,

    /// Current fulfillment status.
    pub status: OrderStatus,

    /// Payment status.
    pub payment_status: PaymentStatus,

    /// The approved lyric, once approval happened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_lyric_id: Option<String>,

    /// Production metadata (set at approval time).
    #[serde(default)]
    pub production: ProductionMetadata,

    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// A generated lyric draft, before persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LyricDraft {
    pub title: String,
    pub body: String,
}

/// One of the two lyric drafts attached to an order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Lyric {
    pub id: String,
    pub order_id: String,
    /// 1 or 2, unique per order.
    pub version: u8,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

/// Production job state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrackStatus {
    Queued,
    Rendering,
    Ready,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Queued => "queued",
            TrackStatus::Rendering => "rendering",
            TrackStatus::Ready => "ready",
            TrackStatus::Failed => "failed",
        }
    }
}

impl FromStr for TrackStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(TrackStatus::Queued),
            "rendering" => Ok(TrackStatus::Rendering),
            "ready" => Ok(TrackStatus::Ready),
            "failed" => Ok(TrackStatus::Failed),
            other => Err(ParseStatusError {
                kind: "track status",
                value: other.to_string(),
            }),
        }
    }
}

/// The production job created once a lyric is approved.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub id: String,
    pub order_id: String,
    pub lyric_id: String,
    pub status: TrackStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_parse_is_case_insensitive() {
        assert_eq!(
            "music_ready".parse::<OrderStatus>().unwrap(),
            OrderStatus::MusicReady
        );
        assert!("SHIPPED".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderStatus::LyricsGenerated).unwrap();
        assert_eq!(json, "\"LYRICS_GENERATED\"");
    }

    #[test]
    fn test_only_completed_is_terminal() {
        let terminal: Vec<_> = OrderStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![&OrderStatus::Completed]);
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!("paid".parse::<PaymentStatus>().unwrap(), PaymentStatus::Paid);
        let err = "refunded".parse::<PaymentStatus>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown payment status: refunded");
    }

    #[test]
    fn test_production_metadata_is_empty() {
        assert!(ProductionMetadata::default().is_empty());
        let meta = ProductionMetadata {
            title: Some("Song".to_string()),
            ..Default::default()
        };
        assert!(!meta.is_empty());
    }
}
