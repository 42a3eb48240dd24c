//! Order API handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use songsmith_core::order::{
    CreateOrderRequest, OrderDetails, OrderFilter, OrderStatus, OrderTrigger, PaymentStatus,
};
use songsmith_core::{Order, OrderError};

use super::error::ApiError;
use super::middleware::Caller;
use crate::state::AppState;

/// Maximum allowed limit for order queries
const MAX_LIMIT: i64 = 1000;

/// Default limit for order queries
const DEFAULT_LIMIT: i64 = 100;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request body for creating an order
#[derive(Debug, Deserialize)]
pub struct CreateOrderBody {
    pub occasion: String,
    pub style: String,
    pub tone: String,
    pub duration_secs: u32,
    pub story: String,
    #[serde(default)]
    pub price_cents: i64,
}

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersParams {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub owner_id: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct ListOrdersResponse {
    pub orders: Vec<Order>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

/// Request body for delivering an external trigger
#[derive(Debug, Deserialize)]
pub struct TriggerBody {
    /// Target status, e.g. `PAID` or `MUSIC_READY`.
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct TransitionResponse {
    pub order: Order,
    pub changed: bool,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub trigger: OrderTrigger,
}

// ============================================================================
// Handlers
// ============================================================================

/// Submit a new order brief
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let request = CreateOrderRequest {
        owner_id: user_id,
        occasion: body.occasion,
        style: body.style,
        tone: body.tone,
        duration_secs: body.duration_secs,
        story: body.story,
        price_cents: body.price_cents,
    };

    let order = state.orders().create_order(request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// Get one of the caller's orders with its lyrics and track
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Caller(user_id): Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderDetails>, ApiError> {
    let details = match state.orders().get_details(&id) {
        Ok(details) if details.order.owner_id == user_id => details,
        Ok(_) | Err(OrderError::NotFound(_)) => {
            return Err(OrderError::NotFoundOrForbidden(id).into())
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Json(details))
}

/// List orders with optional filters
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListOrdersParams>,
) -> Result<Json<ListOrdersResponse>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut filter = OrderFilter::new().with_limit(limit).with_offset(offset);

    if let Some(ref status) = params.status {
        filter = filter.with_status(status.parse::<OrderStatus>()?);
    }

    if let Some(ref payment_status) = params.payment_status {
        filter = filter.with_payment_status(payment_status.parse::<PaymentStatus>()?);
    }

    if let Some(ref owner_id) = params.owner_id {
        filter = filter.with_owner(owner_id);
    }

    let (orders, total) = state.orders().list(&filter)?;

    Ok(Json(ListOrdersResponse {
        orders,
        total,
        limit,
        offset,
    }))
}

/// Deliver an external trigger (payment confirmation, production progress)
pub async fn fire_trigger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TriggerBody>,
) -> Result<Json<TransitionResponse>, ApiError> {
    let target: OrderStatus = body.status.parse()?;

    let record = state.orders().advance_to(&id, target).await?;

    Ok(Json(TransitionResponse {
        changed: record.transition.is_changed(),
        from: record.transition.from(),
        to: record.transition.to(),
        trigger: record.trigger,
        order: record.order,
    }))
}
