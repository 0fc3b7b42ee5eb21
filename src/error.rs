// SPDX-License-Identifier: MIT

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Session token expired")]
    TokenExpired,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Provider code/token exchange failed: {0}")]
    ProviderExchange(String),

    #[error("Provider profile fetch failed: {0}")]
    ProfileFetch(String),

    #[error("A user with this email already exists")]
    DuplicateEmail,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, "token_expired", None),
            AppError::InvalidToken => (StatusCode::BAD_REQUEST, "Invalid token", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            // Error strings for the provider failures match what the
            // dashboard login page matches on.
            AppError::ProviderExchange(msg) => (
                StatusCode::BAD_REQUEST,
                "Failed to get access token",
                Some(msg.clone()),
            ),
            AppError::ProfileFetch(msg) => (
                StatusCode::BAD_REQUEST,
                "Failed to fetch profile",
                Some(msg.clone()),
            ),
            AppError::DuplicateEmail => (StatusCode::CONFLICT, "duplicate_email", None),
            AppError::Database(msg) => {
                tracing::error!(error = %msg, "Database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "database_error", None)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
