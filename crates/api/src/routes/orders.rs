//! Order history and lifecycle endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use commerce::OrderDetails;
use common::OrderId;
use domain::{Order, OrderItem, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub order_number: String,
    pub owner: String,
    pub total_price: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Serialize)]
pub struct CancelResponse {
    pub status: &'static str,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id.to_string(),
            order_number: order.order_number.as_str().to_string(),
            owner: order.owner.to_string(),
            total_price: order.total_price.to_decimal(),
            status: order.status,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: None,
        }
    }
}

impl From<OrderItem> for OrderItemResponse {
    fn from(item: OrderItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            price: item.price.to_decimal(),
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let mut response = OrderResponse::from(details.order);
        response.items = Some(details.items.into_iter().map(Into::into).collect());
        response
    }
}

// -- Handlers --

/// GET /orders and GET /order-history: the caller's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.orders.list_for_owner(caller.user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// GET /orders/{id}: visible to the owner and to staff.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let details = state
        .orders
        .get(caller.user_id, caller.is_staff, order_id)
        .await?;
    Ok(Json(details.into()))
}

/// POST /orders/{id}/cancel: owner cancellation.
#[tracing::instrument(skip(state))]
pub async fn cancel<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<CancelResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    state.orders.cancel(caller.user_id, order_id).await?;
    Ok(Json(CancelResponse {
        status: "Order cancelled",
    }))
}

/// PATCH /orders/{id}/status: staff moves the order along its lifecycle.
#[tracing::instrument(skip(state, payload))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(id): Path<String>,
    payload: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let Json(req) = payload?;
    let next: OrderStatus = req.status.parse().map_err(|message| ApiError::Validation {
        field: "status".to_string(),
        message,
    })?;

    let order = state
        .orders
        .advance_status(caller.is_staff, order_id, next)
        .await?;
    Ok(Json(order.into()))
}
