//! HTTP handlers, one module per resource.

pub mod cart;
pub mod orders;
pub mod products;
pub mod system;
pub mod users;
pub mod webhooks;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path segment into a typed id.
pub(crate) fn parse_id<T: FromStr>(raw: &str, entity: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {entity} ID: {raw}")))
}
