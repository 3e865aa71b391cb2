//! Cart endpoints for the calling user.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{CartItemId, ProductId};
use domain::CartItem;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartItemResponse {
    pub id: String,
    pub product_id: String,
    pub quantity: u32,
    pub line_price: Decimal,
}

impl From<CartItem> for CartItemResponse {
    fn from(item: CartItem) -> Self {
        Self {
            id: item.id.to_string(),
            product_id: item.product_id.to_string(),
            quantity: item.quantity,
            line_price: item.line_price.to_decimal(),
        }
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub id: String,
    pub items: Vec<CartItemResponse>,
    pub total: Decimal,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: String,
}

// -- Handlers --

/// GET /cart: the caller's cart, created on first access.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<Json<CartResponse>, ApiError> {
    let view = state.carts.view(caller.user_id).await?;
    let total = view.total()?.to_decimal();
    Ok(Json(CartResponse {
        id: view.cart.id.to_string(),
        items: view.items.into_iter().map(Into::into).collect(),
        total,
    }))
}

/// POST /cart/items: add a product, merging into an existing line.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CartItemResponse>), ApiError> {
    let Json(req) = payload?;
    let item = state
        .carts
        .add_item(caller.user_id, req.product_id, req.quantity)
        .await?;
    Ok((StatusCode::CREATED, Json(item.into())))
}

/// DELETE /cart/items/{item_id}
#[tracing::instrument(skip(state))]
pub async fn remove_item<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(item_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let item_id: CartItemId = parse_id(&item_id, "cart item")?;
    state.carts.remove_item(caller.user_id, item_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /cart/items/{item_id}: replace the quantity.
#[tracing::instrument(skip(state, payload))]
pub async fn update_quantity<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    Path(item_id): Path<String>,
    payload: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<CartItemResponse>, ApiError> {
    let item_id: CartItemId = parse_id(&item_id, "cart item")?;
    let Json(req) = payload?;
    let item = state
        .carts
        .update_quantity(caller.user_id, item_id, req.quantity)
        .await?;
    Ok(Json(item.into()))
}

/// POST /cart/checkout: open a hosted payment session for the cart.
#[tracing::instrument(skip(state))]
pub async fn checkout<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let session = state.checkout.checkout_for_user(caller.user_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            session_id: session.id,
            url: session.url,
        }),
    ))
}
