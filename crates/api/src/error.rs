//! API error types with HTTP response mapping.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce::CommerceError;
use domain::{DomainError, OrderStatus};

/// API-level error type that maps to HTTP responses.
///
/// Most errors render as `{"detail": "<message>"}`; validation errors render
/// as a field map `{"<field>": ["<message>"]}`.
#[derive(Debug)]
pub enum ApiError {
    /// Bad request from the client.
    BadRequest(String),
    /// Invalid value for a specific field.
    Validation { field: String, message: String },
    /// Missing or malformed caller identity.
    Unauthorized(String),
    /// The caller may not access the resource.
    Forbidden(String),
    /// Resource not found.
    NotFound(String),
    /// A concurrent request won.
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation { field, message } => {
                let mut fields = serde_json::Map::new();
                fields.insert(field, serde_json::json!([message]));
                serde_json::Value::Object(fields)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                serde_json::json!({ "detail": msg })
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => serde_json::json!({ "detail": msg }),
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found.")),
            DomainError::InvalidQuantity { .. } => ApiError::Validation {
                field: "quantity".to_string(),
                message: "Quantity must be greater than 0.".to_string(),
            },
            DomainError::Validation { field, message } => ApiError::Validation {
                field: field.to_string(),
                message,
            },
            DomainError::InsufficientStock { available, .. } => ApiError::BadRequest(format!(
                "Insufficient stock. Only {available} item(s) available."
            )),
            DomainError::Forbidden(msg) => ApiError::Forbidden(msg),
            DomainError::ImmutableOrder { .. } => {
                ApiError::BadRequest("Cannot modify delivered or cancelled orders.".to_string())
            }
            DomainError::InvalidTransition {
                to: OrderStatus::Cancelled,
                ..
            } => ApiError::BadRequest(
                "Cannot cancel an order that is already shipped or delivered.".to_string(),
            ),
            err @ DomainError::InvalidTransition { .. } => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        match err {
            CommerceError::Domain(err) => err.into(),
            CommerceError::Conflict(msg) => ApiError::Conflict(msg),
            CommerceError::SignatureInvalid(_) => {
                ApiError::BadRequest("Invalid signature.".to_string())
            }
            CommerceError::MalformedEvent(msg) => {
                ApiError::BadRequest(format!("Invalid payload: {msg}"))
            }
            err @ (CommerceError::PaymentProvider(_)
            | CommerceError::PartialFailure { .. }
            | CommerceError::Notification(_)
            | CommerceError::Store(_)) => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_errors_map_to_status_codes() {
        let cases = [
            (DomainError::not_found("Order", "x"), StatusCode::NOT_FOUND),
            (
                DomainError::InvalidQuantity { quantity: 0 },
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::Forbidden("no".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                DomainError::ImmutableOrder {
                    status: OrderStatus::Delivered,
                },
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).status(), expected);
        }
    }

    #[test]
    fn test_cancel_transition_message() {
        let err = ApiError::from(DomainError::InvalidTransition {
            from: OrderStatus::Shipped,
            to: OrderStatus::Cancelled,
        });
        assert!(matches!(
            err,
            ApiError::BadRequest(ref msg) if msg == "Cannot cancel an order that is already shipped or delivered."
        ));
    }

    #[test]
    fn test_fulfillment_failures_are_server_errors() {
        let err = ApiError::from(CommerceError::PartialFailure {
            event_id: "evt_1".to_string(),
            reason: "boom".to_string(),
        });
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = ApiError::from(CommerceError::SignatureInvalid("bad".to_string()));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
