use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::metrics_middleware;
use super::{events, handlers, lyrics, notifications, orders, recovery};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Event log
        .route("/events", get(events::query_events))
        // Orders
        .route("/orders", post(orders::create_order))
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/triggers", post(orders::fire_trigger))
        .route("/orders/{id}/events", get(events::order_history))
        // Lyrics
        .route("/orders/{id}/lyrics/generate", post(lyrics::generate_lyrics))
        .route(
            "/orders/{id}/lyrics/{lyric_id}/approve",
            post(lyrics::approve_lyric),
        )
        // Recovery
        .route("/recovery/sweep", post(recovery::run_sweep))
        // Notifications
        .route("/push/endpoints", post(notifications::register_endpoint))
        .route("/notifications", get(notifications::list_notifications));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
