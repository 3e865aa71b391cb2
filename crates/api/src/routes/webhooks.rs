//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde::Serialize;
use store::Store;

use crate::error::ApiError;
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

/// POST /webhooks/payments: fulfill completed checkout sessions.
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes and parsed only after the signature matches.
#[tracing::instrument(skip_all)]
pub async fn payments<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let outcome = state.fulfillment.handle(&body, signature).await?;
    metrics::counter!("webhook_deliveries_acknowledged", "outcome" => outcome.as_str()).increment(1);
    tracing::info!(outcome = outcome.as_str(), "webhook acknowledged");

    Ok(Json(WebhookResponse {
        status: outcome.as_str(),
        order_id: outcome.order_id().map(|id| id.to_string()),
    }))
}
