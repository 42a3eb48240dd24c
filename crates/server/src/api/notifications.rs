//! Push endpoint registration and notification history.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use songsmith_core::notify::{NotificationFilter, NotificationLogEntry, PushEndpoint};

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

const MAX_LIMIT: i64 = 1000;
const DEFAULT_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct RegisterEndpointBody {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct NotificationQueryParams {
    pub order_id: Option<String>,
    pub recipient_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct NotificationQueryResponse {
    pub notifications: Vec<NotificationLogEntry>,
    pub limit: i64,
    pub offset: i64,
}

/// Register a push endpoint for the caller
pub async fn register_endpoint(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(body): Json<RegisterEndpointBody>,
) -> Result<(StatusCode, Json<PushEndpoint>), ApiError> {
    let endpoint = state.endpoints().register(&user_id, body.url.trim())?;
    Ok((StatusCode::CREATED, Json(endpoint)))
}

/// Query the notification log
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    Query(params): Query<NotificationQueryParams>,
) -> Result<Json<NotificationQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = NotificationFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref order_id) = params.order_id {
        filter = filter.with_order_id(order_id);
    }

    if let Some(ref recipient_id) = params.recipient_id {
        filter = filter.with_recipient_id(recipient_id);
    }

    let notifications = state.notification_log().query(&filter)?;

    Ok(Json(NotificationQueryResponse {
        notifications,
        limit,
        offset,
    }))
}
