// SPDX-License-Identifier: MIT

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::UserResponse;
use crate::services::ProfileEdit;
use crate::AppState;
use axum::{
    extract::State,
    routing::{get, put},
    Extension, Json, Router,
};
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", put(update_profile))
}

/// Get the current user's directory record.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let record = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(UserResponse::from(record)))
}

/// Explicit profile edit from the profile page.
///
/// Overwrites the editable fields unconditionally; only required-field
/// presence is validated.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(edit): Json<ProfileEdit>,
) -> Result<Json<UserResponse>> {
    edit.validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let record = state.directory.update_profile(&user.user_id, edit).await?;

    tracing::info!(user_id = %record.id, "Profile updated");

    Ok(Json(UserResponse::from(record)))
}
