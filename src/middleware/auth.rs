// SPDX-License-Identifier: MIT

//! JWT session tokens: issuance, verification, and the auth middleware.
//!
//! Every protected route goes through [`require_auth`]; there are no
//! per-route token checks anywhere else.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session token lifetime (7 days).
const TOKEN_TTL_SECS: usize = 7 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (directory record id)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated user extracted from a valid session token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
}

/// Middleware that requires a valid session token.
///
/// Accepts the token from the `session_token` cookie or a Bearer header.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Try cookie first, then header
    let token = if let Some(cookie) = jar.get("session_token") {
        cookie.value().to_string()
    } else {
        let auth_header = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        match auth_header {
            Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
            _ => return Err(AppError::Unauthorized),
        }
    };

    let claims = verify_jwt(&token, &state.config.jwt_signing_key)?;

    let auth_user = AuthUser {
        user_id: claims.sub,
    };
    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Mint a session token bound to a directory record id.
pub fn create_jwt(user_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        iat: now,
        exp: now + TOKEN_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a session token, distinguishing expiry from a bad signature.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Result<Claims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    match decode::<Claims>(token, &key, &validation) {
        Ok(data) => Ok(data.claims),
        Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(AppError::TokenExpired),
        Err(_) => Err(AppError::Unauthorized),
    }
}
