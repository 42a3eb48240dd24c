//! Order storage trait and types.

use thiserror::Error;

use super::state::{OrderTrigger, Transition};
use super::types::{Lyric, LyricDraft, Order, OrderStatus, PaymentStatus, ProductionMetadata, Track};

/// Error type for order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order (or lyric) not found.
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Resource missing or not owned by the caller. The two cases are not
    /// distinguished so callers cannot probe for foreign ids.
    #[error("Not found or not accessible: {0}")]
    NotFoundOrForbidden(String),

    /// Malformed or missing input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The brief contains disallowed terms.
    #[error("Content rejected, disallowed terms: {}", .0.join(", "))]
    ContentRejected(Vec<String>),

    /// The trigger's precondition does not hold for the current status.
    #[error("Cannot apply {trigger} to order {order_id}: current status is {from}")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        trigger: OrderTrigger,
    },

    /// The order already has an approved lyric and a track.
    #[error("Order {0} already has an approved lyric")]
    AlreadyApproved(String),

    /// Another writer already stored the lyric pair for this order.
    #[error("Lyrics already exist for order {0}")]
    DuplicateLyrics(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Request to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub owner_id: String,
    pub occasion: String,
    pub style: String,
    pub tone: String,
    pub duration_secs: u32,
    pub story: String,
    pub price_cents: i64,
}

/// Filter for querying orders.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Filter by fulfillment status.
    pub status: Option<OrderStatus>,
    /// Filter by payment status.
    pub payment_status: Option<PaymentStatus>,
    /// Filter by owner.
    pub owner_id: Option<String>,
    /// Maximum number of results.
    pub limit: i64,
    /// Offset for pagination.
    pub offset: i64,
}

impl OrderFilter {
    /// Create a new filter with defaults.
    pub fn new() -> Self {
        Self {
            limit: 100,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_payment_status(mut self, payment_status: PaymentStatus) -> Self {
        self.payment_status = Some(payment_status);
        self
    }

    pub fn with_owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = Some(owner_id.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = offset;
        self
    }
}

/// Outcome of firing a trigger against a stored order.
#[derive(Debug, Clone)]
pub struct TransitionRecord {
    /// The order after the trigger was applied.
    pub order: Order,
    pub transition: Transition,
    pub trigger: OrderTrigger,
}

/// The persisted lyric pair together with the status change it caused.
#[derive(Debug, Clone)]
pub struct SavedLyrics {
    pub lyrics: Vec<Lyric>,
    pub transition: TransitionRecord,
}

/// Everything written by a successful approval.
#[derive(Debug, Clone)]
pub struct ApprovalRecord {
    pub lyric: Lyric,
    pub track: Track,
    pub transition: TransitionRecord,
}

/// Trait for order storage backends.
///
/// Implementations must enforce uniqueness of `(order, version)` for lyrics
/// and of `order` for tracks at the storage level, and write multi-row changes
/// atomically.
pub trait OrderStore: Send + Sync {
    /// Create a new order in `Draft`.
    fn create(&self, request: CreateOrderRequest) -> Result<Order, OrderError>;

    /// Get an order by ID.
    fn get(&self, id: &str) -> Result<Option<Order>, OrderError>;

    /// List orders matching the filter.
    fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>, OrderError>;

    /// Count orders matching the filter.
    fn count(&self, filter: &OrderFilter) -> Result<i64, OrderError>;

    /// Fire a state machine trigger. Invalid transitions leave the row untouched.
    fn apply_trigger(&self, id: &str, trigger: OrderTrigger)
        -> Result<TransitionRecord, OrderError>;

    /// Lyrics of an order, ordered by version.
    fn lyrics_for_order(&self, order_id: &str) -> Result<Vec<Lyric>, OrderError>;

    /// Number of lyrics stored for an order (0 or 2).
    fn lyric_count(&self, order_id: &str) -> Result<usize, OrderError>;

    /// Get a lyric by ID.
    fn get_lyric(&self, lyric_id: &str) -> Result<Option<Lyric>, OrderError>;

    /// Insert both drafts (versions 1 and 2), bump the order and fire
    /// `LyricsGenerated`, all in one transaction.
    ///
    /// Fails with [`OrderError::DuplicateLyrics`] if any lyric already exists.
    fn save_lyric_pair(
        &self,
        order_id: &str,
        drafts: &[LyricDraft; 2],
    ) -> Result<SavedLyrics, OrderError>;

    /// Approve a lyric for an order owned by `user_id`: stamp the lyric, set the
    /// order's approved lyric and production metadata, fire `LyricApproved`,
    /// and create the queued track, all in one transaction.
    fn approve_lyric(
        &self,
        user_id: &str,
        order_id: &str,
        lyric_id: &str,
        production: ProductionMetadata,
    ) -> Result<ApprovalRecord, OrderError>;

    /// The track of an order, if approved.
    fn track_for_order(&self, order_id: &str) -> Result<Option<Track>, OrderError>;

    /// Orders with confirmed payment and no lyrics, oldest update first.
    fn list_paid_without_lyrics(&self, limit: i64) -> Result<Vec<Order>, OrderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrderError::ContentRejected(vec!["foo".to_string(), "bar".to_string()]);
        assert_eq!(err.to_string(), "Content rejected, disallowed terms: foo, bar");

        let err = OrderError::InvalidTransition {
            order_id: "o-1".to_string(),
            from: OrderStatus::Draft,
            trigger: OrderTrigger::LyricApproved,
        };
        assert_eq!(
            err.to_string(),
            "Cannot apply lyric_approved to order o-1: current status is DRAFT"
        );
    }

    #[test]
    fn test_filter_builder() {
        let filter = OrderFilter::new()
            .with_status(OrderStatus::Paid)
            .with_owner("user-1")
            .with_limit(10)
            .with_offset(20);

        assert_eq!(filter.status, Some(OrderStatus::Paid));
        assert_eq!(filter.owner_id.as_deref(), Some("user-1"));
        assert_eq!(filter.limit, 10);
        assert_eq!(filter.offset, 20);
    }
}
