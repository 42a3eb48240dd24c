//! Orders, their lyric drafts and production tracks.
//!
//! The order row is the unit of fulfillment. Its status only moves through
//! [`OrderTrigger`]s (see `state.rs`); lyrics are written in pairs and the
//! single track is written at approval time, both inside SQLite transactions.

mod service;
mod sqlite_store;
mod state;
mod store;
mod types;

pub(crate) use service::announce_transition;
pub use service::{OrderDetails, OrderService};
pub use sqlite_store::SqliteOrderStore;
pub use state::{OrderTrigger, Transition};
pub use store::{
    ApprovalRecord, CreateOrderRequest, OrderError, OrderFilter, OrderStore, SavedLyrics,
    TransitionRecord,
};
pub use types::{
    Lyric, LyricDraft, Order, OrderStatus, ParseStatusError, PaymentStatus, ProductionMetadata,
    Track, TrackStatus, MAX_TITLE_CHARS,
};
