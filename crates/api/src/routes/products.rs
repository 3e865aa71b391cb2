//! Product listing endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use commerce::NewProduct;
use common::{Money, ProductId};
use domain::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub stock: i64,
}

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub stock: u32,
    pub available: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.to_string(),
            owner: product.owner.to_string(),
            name: product.name,
            description: product.description,
            price: product.price.to_decimal(),
            stock: product.stock,
            available: product.available,
        }
    }
}

/// POST /products: list a product owned by the caller.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    caller: Caller,
    payload: Result<Json<CreateProductRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let Json(req) = payload?;
    let price = Money::from_decimal(req.price).ok_or_else(|| ApiError::Validation {
        field: "price".to_string(),
        message: "Ensure that there are no more than 2 decimal places.".to_string(),
    })?;

    let product = state
        .catalog
        .create_product(
            caller.user_id,
            NewProduct {
                name: req.name,
                description: req.description,
                price,
                stock: req.stock,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state.catalog.get_product(product_id).await?;
    Ok(Json(product.into()))
}
