//! Registration and profile endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::UserId;
use domain::Profile;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::auth::Caller;
use crate::error::ApiError;
use crate::routes::parse_id;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user_id: String,
    pub name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Profile> for ProfileResponse {
    fn from(profile: Profile) -> Self {
        Self {
            user_id: profile.owner.to_string(),
            name: profile.name,
            content: profile.content,
            created_at: profile.created_at,
            updated_at: profile.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub profile: ProfileResponse,
}

/// POST /users: register a user and provision their profile.
#[tracing::instrument(skip(state, payload))]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let Json(req) = payload?;
    let registration = state.accounts.register(&req.username, &req.email).await?;

    Ok((
        StatusCode::CREATED,
        Json(UserResponse {
            id: registration.user.id.to_string(),
            username: registration.user.username,
            email: registration.user.email,
            profile: registration.profile.into(),
        }),
    ))
}

/// GET /users/{id}/profile
#[tracing::instrument(skip(state))]
pub async fn profile<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user_id: UserId = parse_id(&id, "user")?;
    let profile = state.accounts.get_profile(user_id).await?;
    Ok(Json(profile.into()))
}
