use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use songsmith_core::events::{EventFilter, EventRecord};
use songsmith_core::OrderError;

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

/// Maximum allowed limit for event queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for event queries
const DEFAULT_LIMIT: i64 = 100;

/// Query parameters for the event log endpoint
#[derive(Debug, Deserialize)]
pub struct EventQueryParams {
    /// Filter by order ID
    pub order_id: Option<String>,
    /// Filter by event type, e.g. `LYRICS_GENERATED`
    pub event_type: Option<String>,
    /// Filter by user ID
    pub user_id: Option<String>,
    /// Filter events after this timestamp (ISO 8601)
    pub from: Option<DateTime<Utc>>,
    /// Filter events before this timestamp (ISO 8601)
    pub to: Option<DateTime<Utc>>,
    /// Maximum number of events to return (default 100, max 1000)
    pub limit: Option<i64>,
    /// Pagination offset (default 0)
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EventQueryResponse {
    pub events: Vec<EventRecord>,
    /// Total number of matching events
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Query the order event log
pub async fn query_events(
    State(state): State<Arc<AppState>>,
    Query(params): Query<EventQueryParams>,
) -> Result<Json<EventQueryResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    // Shared between query and count
    let mut base_filter = EventFilter::new();

    if let Some(ref order_id) = params.order_id {
        base_filter = base_filter.with_order_id(order_id);
    }

    if let Some(ref event_type) = params.event_type {
        base_filter = base_filter.with_event_type(event_type);
    }

    if let Some(ref user_id) = params.user_id {
        base_filter = base_filter.with_user_id(user_id);
    }

    if params.from.is_some() || params.to.is_some() {
        base_filter = base_filter.with_time_range(params.from, params.to);
    }

    let query_filter = EventFilter {
        limit,
        offset,
        ..base_filter.clone()
    };

    let events = state.event_store().query(&query_filter)?;
    let total = state.event_store().count(&base_filter)?;

    Ok(Json(EventQueryResponse {
        events,
        total,
        limit,
        offset,
    }))
}

#[derive(Debug, Serialize)]
pub struct OrderHistoryResponse {
    pub order_id: String,
    /// Oldest first
    pub events: Vec<EventRecord>,
}

/// Everything logged about one of the caller's orders
pub async fn order_history(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderHistoryResponse>, ApiError> {
    match state.orders().get(&id) {
        Ok(order) if order.owner_id == user_id => {}
        Ok(_) | Err(OrderError::NotFound(_)) => {
            return Err(OrderError::NotFoundOrForbidden(id).into())
        }
        Err(e) => return Err(e.into()),
    }

    let events = state.event_store().order_history(&id)?;
    Ok(Json(OrderHistoryResponse {
        order_id: id,
        events,
    }))
}
