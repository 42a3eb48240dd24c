//! Testing utilities and mock implementations.
//!
//! Mocks for the two outbound boundaries (text generation and push delivery)
//! plus fixtures that build orders in a given state, so pipeline and API tests
//! run without network access.
//!
//! # Example
//!
//! ```rust,ignore
//! use songsmith_core::testing::{fixtures, MockProvider};
//!
//! let store = SqliteOrderStore::in_memory()?;
//! let provider = MockProvider::with_text(fixtures::TWO_DRAFTS);
//! let order = fixtures::paid_order(&store, "user-1");
//! ```

mod mock_provider;
mod mock_push;

pub use mock_provider::MockProvider;
pub use mock_push::MockPushTransport;

/// Test fixtures and helper functions.
pub mod fixtures {
    use chrono::Utc;

    use crate::order::{
        CreateOrderRequest, Lyric, LyricDraft, Order, OrderStatus, OrderStore, OrderTrigger,
        PaymentStatus, ProductionMetadata,
    };

    /// Provider output holding two drafts separated by a delimiter line.
    pub const TWO_DRAFTS: &str = "Sail Away\n\
[Verse]\n\
Anna on the water, wind is in her hair\n\
Biscuit on the bow, barking at the air\n\
\n\
---\n\
\n\
Biscuit's Song\n\
[Chorus]\n\
Four paws and a sail, a girl and her friend\n\
Chasing the horizon to the very end\n";

    /// A valid brief with a clean story.
    pub fn order_request(owner_id: &str) -> CreateOrderRequest {
        CreateOrderRequest {
            owner_id: owner_id.to_string(),
            occasion: "birthday".to_string(),
            style: "acoustic pop".to_string(),
            tone: "warm".to_string(),
            duration_secs: 150,
            story: "Anna loves sailing and her dog Biscuit.".to_string(),
            price_cents: 4900,
        }
    }

    /// An unsaved order owned by `user-1` in the given status.
    pub fn order(status: OrderStatus) -> Order {
        let request = order_request("user-1");
        let now = Utc::now();
        let payment_status = if OrderStatus::ALL
            .iter()
            .position(|s| *s == status)
            .unwrap_or(0)
            >= 2
        {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };

        Order {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: request.owner_id,
            occasion: request.occasion,
            style: request.style,
            tone: request.tone,
            duration_secs: request.duration_secs,
            story: request.story,
            price_cents: request.price_cents,
            status,
            payment_status,
            approved_lyric_id: None,
            production: ProductionMetadata::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Two drafts as the splitter would produce them.
    pub fn drafts() -> [LyricDraft; 2] {
        [
            LyricDraft {
                title: "Sail Away".to_string(),
                body: "Anna on the water".to_string(),
            },
            LyricDraft {
                title: "Biscuit's Song".to_string(),
                body: "Four paws and a sail".to_string(),
            },
        ]
    }

    /// Store a new order and confirm its payment.
    pub fn paid_order(store: &dyn OrderStore, owner_id: &str) -> Order {
        store_paid(store, order_request(owner_id))
    }

    /// Like [`paid_order`] with a custom story. The story is not moderated.
    pub fn paid_order_with_story(store: &dyn OrderStore, owner_id: &str, story: &str) -> Order {
        let mut request = order_request(owner_id);
        request.story = story.to_string();
        store_paid(store, request)
    }

    /// Store a paid order with both lyric drafts saved.
    pub fn order_with_lyrics(store: &dyn OrderStore, owner_id: &str) -> (Order, Vec<Lyric>) {
        let order = paid_order(store, owner_id);
        store
            .apply_trigger(&order.id, OrderTrigger::GenerationStarted)
            .expect("generation should start");
        let saved = store
            .save_lyric_pair(&order.id, &drafts())
            .expect("lyrics should save");
        (saved.transition.order, saved.lyrics)
    }

    fn store_paid(store: &dyn OrderStore, request: CreateOrderRequest) -> Order {
        let order = store.create(request).expect("order should be created");
        store
            .apply_trigger(&order.id, OrderTrigger::SubmitForPayment)
            .expect("checkout should start");
        store
            .apply_trigger(&order.id, OrderTrigger::PaymentConfirmed)
            .expect("payment should confirm")
            .order
    }
}
