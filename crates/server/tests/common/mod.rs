//! Common test utilities for API testing with mocks.
//!
//! The fixture builds the real router over a temporary SQLite database with
//! the text generation provider and push transport replaced by mocks.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use songsmith_core::events::EventStore;
use songsmith_core::notify::{
    EndpointRegistry, NotificationLogStore, SqliteEndpointRegistry, SqliteNotificationLog,
};
use songsmith_core::testing::{MockProvider, MockPushTransport};
use songsmith_core::{
    create_event_log, Config, OrderStore, SqliteEventStore, SqliteOrderStore,
};
use songsmith_server::api::middleware::USER_ID_HEADER;
use songsmith_server::state::AppState;

/// Re-export fixtures for test convenience
#[allow(unused_imports)]
pub use songsmith_core::testing::fixtures;

/// In-process server with controllable outbound mocks.
pub struct TestFixture {
    pub router: Router,
    pub state: Arc<AppState>,
    /// Mock text generation provider, answers with two drafts by default
    pub provider: Arc<MockProvider>,
    /// Mock push transport, records every delivery attempt
    pub transport: Arc<MockPushTransport>,
    /// Holds the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

#[allow(dead_code)]
impl TestFixture {
    /// Fixture where lyrics are only generated on request, so tests control
    /// when the provider is called.
    pub async fn new() -> Self {
        let mut config = Config::default();
        config.generation.on_payment = false;
        Self::with_config(config).await
    }

    /// Build a fixture on top of `config`; the database path is always
    /// replaced by a temporary one.
    pub async fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        config.database.path = db_path.clone();

        let provider = Arc::new(MockProvider::with_text(fixtures::TWO_DRAFTS));
        let transport = Arc::new(MockPushTransport::new());

        let order_store: Arc<dyn OrderStore> =
            Arc::new(SqliteOrderStore::new(&db_path).expect("Failed to create order store"));
        let event_store: Arc<dyn EventStore> =
            Arc::new(SqliteEventStore::new(&db_path).expect("Failed to create event store"));
        let endpoints: Arc<dyn EndpointRegistry> = Arc::new(
            SqliteEndpointRegistry::new(&db_path).expect("Failed to create endpoint registry"),
        );
        let notification_log: Arc<dyn NotificationLogStore> = Arc::new(
            SqliteNotificationLog::new(&db_path).expect("Failed to create notification log"),
        );

        let (events, writer) = create_event_log(Arc::clone(&event_store), 100);
        tokio::spawn(writer.run());

        let state = Arc::new(AppState::new(
            config,
            order_store,
            events,
            event_store,
            endpoints,
            notification_log,
            provider.clone(),
            transport.clone(),
        ));

        let router = songsmith_server::api::create_router(Arc::clone(&state));

        Self {
            router,
            state,
            provider,
            transport,
            temp_dir,
        }
    }

    /// GET without a caller identity.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, None).await
    }

    /// GET as `user_id`.
    pub async fn get_as(&self, user_id: &str, path: &str) -> TestResponse {
        self.request("GET", path, Some(user_id), None).await
    }

    /// POST without a caller identity.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, None, Some(body)).await
    }

    /// POST as `user_id`.
    pub async fn post_as(&self, user_id: &str, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(user_id), Some(body)).await
    }

    /// Raw GET returning the status and body text (for non-JSON endpoints).
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn request(
        &self,
        method: &str,
        path: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);

        if let Some(user_id) = user_id {
            request_builder = request_builder.header(USER_ID_HEADER, user_id);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }

    /// Create an order as `user_id` and return its id.
    pub async fn create_order(&self, user_id: &str) -> String {
        let response = self
            .post_as(user_id, "/api/v1/orders", order_body("Anna loves sailing and her dog Biscuit."))
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
        response.body["id"].as_str().unwrap().to_string()
    }

    /// Create an order as `user_id` and confirm its payment.
    pub async fn create_paid_order(&self, user_id: &str) -> String {
        let order_id = self.create_order(user_id).await;
        for status in ["AWAITING_PAYMENT", "PAID"] {
            let response = self
                .post(
                    &format!("/api/v1/orders/{}/triggers", order_id),
                    json!({ "status": status }),
                )
                .await;
            assert_eq!(response.status, StatusCode::OK, "{}", response.body);
        }
        order_id
    }

    /// Poll `check` until it holds or a second passes.
    pub async fn wait_until<F: Fn() -> bool>(&self, check: F) -> bool {
        for _ in 0..50 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        check()
    }
}

/// Order brief as accepted by `POST /api/v1/orders`.
#[allow(dead_code)]
pub fn order_body(story: &str) -> Value {
    json!({
        "occasion": "birthday",
        "style": "acoustic pop",
        "tone": "warm",
        "duration_secs": 150,
        "story": story,
        "price_cents": 4900
    })
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
