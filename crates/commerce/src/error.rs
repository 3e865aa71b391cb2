//! Application error types.

use domain::DomainError;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur in the application services.
#[derive(Debug, Error)]
pub enum CommerceError {
    /// A business rule rejected the operation.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Store error.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// A concurrent writer changed the row first.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The webhook signature header is missing, malformed, stale or wrong.
    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(String),

    /// The webhook body could not be interpreted.
    #[error("Malformed webhook payload: {0}")]
    MalformedEvent(String),

    /// The payment provider rejected or failed the request.
    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    /// The fulfillment transaction was aborted; nothing was written.
    #[error("Fulfillment of event {event_id} aborted: {reason}")]
    PartialFailure { event_id: String, reason: String },

    /// The mail gateway failed.
    #[error("Notification error: {0}")]
    Notification(String),
}

impl From<StoreError> for CommerceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Rejected(domain) => CommerceError::Domain(domain),
            StoreError::NotFound { entity, id } => {
                CommerceError::Domain(DomainError::NotFound { entity, id })
            }
            StoreError::Conflict(message) => CommerceError::Conflict(message),
            other => CommerceError::Store(other),
        }
    }
}

/// Convenience type alias for application results.
pub type Result<T> = std::result::Result<T, CommerceError>;
