//! Caller identity.
//!
//! Authentication happens in front of this service. The gateway forwards the
//! authenticated user as `X-User-Id` and marks staff with `X-User-Role: staff`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The authenticated user making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub is_staff: bool,
}

impl<S: Send + Sync> FromRequestParts<S> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::Unauthorized("Authentication credentials were not provided.".to_string())
            })?;
        let user_id = raw
            .trim()
            .parse()
            .map_err(|_| ApiError::Unauthorized("Invalid user identity.".to_string()))?;
        let is_staff = parts
            .headers
            .get(USER_ROLE_HEADER)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|role| role.eq_ignore_ascii_case("staff"));

        Ok(Caller { user_id, is_staff })
    }
}
