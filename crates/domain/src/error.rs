//! Domain error types.

use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised when a business rule rejects an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A referenced entity does not exist (or is not visible to the caller).
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Quantities must be positive integers.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: i64 },

    /// Requested quantity exceeds the product's current stock.
    #[error("Insufficient stock for product {product_id}: requested {requested}, in stock {available}")]
    InsufficientStock {
        product_id: String,
        requested: u32,
        available: u32,
    },

    /// The caller does not own the resource it tries to mutate.
    #[error("{0}")]
    Forbidden(String),

    /// The order reached a terminal status and can no longer change.
    #[error("Cannot modify an order in {status} status")]
    ImmutableOrder { status: OrderStatus },

    /// The requested status change is not part of the order lifecycle.
    #[error("Cannot move an order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// Malformed input for a specific field.
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl DomainError {
    /// Shorthand for a [`DomainError::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`DomainError::Validation`].
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field,
            message: message.into(),
        }
    }
}

/// Convenience type alias for domain results.
pub type Result<T> = std::result::Result<T, DomainError>;
