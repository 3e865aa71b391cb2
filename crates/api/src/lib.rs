//! HTTP API server with observability for the storefront backend.
//!
//! Provides REST endpoints for accounts, products, carts and orders, plus the
//! payment webhook that drives order fulfillment, with structured logging
//! (tracing) and Prometheus metrics.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use error::ApiError;
pub use state::{AppState, Services};

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::system::metrics))
        .with_state(metrics_handle);

    Router::new()
        .route("/", get(routes::system::welcome))
        .route("/health", get(routes::system::health))
        .route("/users", post(routes::users::register::<S>))
        .route("/users/{id}/profile", get(routes::users::profile::<S>))
        .route("/products", post(routes::products::create::<S>))
        .route("/products/{id}", get(routes::products::get::<S>))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/items", post(routes::cart::add_item::<S>))
        .route(
            "/cart/items/{item_id}",
            patch(routes::cart::update_quantity::<S>).delete(routes::cart::remove_item::<S>),
        )
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/order-history", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/cancel", post(routes::orders::cancel::<S>))
        .route("/orders/{id}/status", patch(routes::orders::update_status::<S>))
        .route("/webhooks/payments", post(routes::webhooks::payments::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with the services `config` provides.
pub fn create_default_state<S: Store + Clone + 'static>(
    store: S,
    config: &Config,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, Services::from_config(config)))
}
