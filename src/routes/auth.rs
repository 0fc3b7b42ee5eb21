// SPDX-License-Identifier: MIT

//! Login entry points: Google/local JSON login, the Facebook redirect
//! flow, and the one-time login-code exchange.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{AppError, Result};
use crate::middleware::auth::create_jwt;
use crate::models::{Provider, UserRecord, UserResponse};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/auth", post(login))
        .route("/api/auth/session", post(exchange_login_code))
        .route("/api/auth/facebook", get(facebook_start))
        .route("/api/auth/facebook/callback", get(facebook_callback))
}

/// Successful login response for the JSON entry points.
#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserResponse,
}

/// Body of `POST /api/auth` - a Google ID token, or local credentials.
#[derive(Deserialize)]
#[serde(untagged)]
enum LoginRequest {
    Google { token: String },
    Local { email: String, password: String },
}

/// Google/local login entry point.
async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>> {
    match body {
        LoginRequest::Google { token } => google_login(&state, &token).await,
        LoginRequest::Local { email, password } => local_login(&state, &email, &password).await,
    }
}

/// Verify a Google ID token, resolve the directory record, issue a session.
async fn google_login(state: &Arc<AppState>, id_token: &str) -> Result<Json<AuthResponse>> {
    let mut profile = state.google.verify_id_token(id_token).await?;

    // People API enrichment only happens when the email has never been
    // seen; a failed enrichment call skips the extra fields, never the login.
    let is_new = state
        .db
        .find_user_by_email(&profile.email)
        .await?
        .is_none();

    if is_new {
        if let Some(extra) = state.google.fetch_person(id_token).await {
            profile.birthday = extra.birthday;
            profile.phone = extra.phone;
            profile.address = extra.address;
        }
    }

    let (user, created) = state.directory.resolve_or_create(profile).await?;

    tracing::info!(
        user_id = %user.id,
        provider = %Provider::Google,
        created,
        "Google login successful"
    );

    respond_with_session(state, user)
}

/// Local credential entry point.
///
/// Only records that carry a bcrypt hash can log in locally; records
/// created via an OAuth provider have none and are rejected.
async fn local_login(
    state: &Arc<AppState>,
    email: &str,
    password: &str,
) -> Result<Json<AuthResponse>> {
    let user = state
        .db
        .find_user_by_email(email)
        .await?
        .ok_or(AppError::Unauthorized)?;

    let hash = user.password_hash.as_deref().ok_or(AppError::Unauthorized)?;

    let verified = bcrypt::verify(password, hash)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("bcrypt verify failed: {}", e)))?;
    if !verified {
        return Err(AppError::Unauthorized);
    }

    tracing::info!(user_id = %user.id, "Local login successful");

    respond_with_session(state, user)
}

fn respond_with_session(state: &Arc<AppState>, user: UserRecord) -> Result<Json<AuthResponse>> {
    let token = create_jwt(&user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

// ─── Facebook redirect flow ──────────────────────────────────────────────────

/// Start the Facebook OAuth flow - redirect to the authorization dialog.
async fn facebook_start(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let redirect_uri = callback_uri(&state.config.base_url);

    let oauth_state = sign_state(&state.config.frontend_url, &state.config.oauth_state_key)?;

    let auth_url = state.facebook.authorize_url(&redirect_uri, &oauth_state);

    tracing::info!(
        app_id = %state.config.facebook_app_id,
        "Starting Facebook OAuth flow"
    );

    Ok(Redirect::temporary(&auth_url))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Facebook OAuth callback: exchange the code, resolve the record, and
/// redirect to the login page with a one-time code (the session JWT never
/// appears in a URL).
async fn facebook_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Redirect> {
    let frontend_url = params
        .state
        .as_deref()
        .and_then(|s| verify_and_decode_state(s, &state.config.oauth_state_key))
        .unwrap_or_else(|| {
            tracing::warn!("Invalid or missing state parameter, using configured frontend URL");
            state.config.frontend_url.clone()
        });

    // Provider-reported error (user denied, etc.): bounce back to the login page
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Facebook");
        let redirect = format!("{}/login?error={}", frontend_url, urlencoding::encode(&error));
        return Ok(Redirect::temporary(&redirect));
    }

    let code = params
        .code
        .ok_or_else(|| AppError::BadRequest("No code provided".to_string()))?;

    let redirect_uri = callback_uri(&state.config.base_url);

    let access_token = state.facebook.exchange_code(&code, &redirect_uri).await?;
    let profile = state.facebook.fetch_profile(&access_token).await?;

    let (user, created) = state.directory.resolve_or_create(profile.normalize()).await?;

    tracing::info!(
        user_id = %user.id,
        provider = %Provider::Facebook,
        created,
        "Facebook login successful"
    );

    let token = create_jwt(&user.id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let login_code = state.tickets.issue(token, user);
    let redirect_url = format!("{}/login?code={}", frontend_url, login_code);

    Ok(Redirect::temporary(&redirect_url))
}

#[derive(Deserialize)]
struct ExchangeRequest {
    code: String,
}

/// Exchange a one-time login code for `{token, user}`.
async fn exchange_login_code(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ExchangeRequest>,
) -> Result<Json<AuthResponse>> {
    let (token, user) = state
        .tickets
        .redeem(&body.code)
        .ok_or_else(|| AppError::BadRequest("Invalid or expired login code".to_string()))?;

    Ok(Json(AuthResponse {
        token,
        user: UserResponse::from(user),
    }))
}

fn callback_uri(base_url: &str) -> String {
    format!("{}/api/auth/facebook/callback", base_url)
}

// ─── OAuth state signing ─────────────────────────────────────────────────────

/// Sign `frontend_url|timestamp` with HMAC-SHA256 and base64url-encode it.
fn sign_state(frontend_url: &str, secret: &[u8]) -> Result<String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis();

    let state_payload = format!("{}|{:x}", frontend_url, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(state_payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed_state = format!("{}|{}", state_payload, hex::encode(signature));

    Ok(URL_SAFE_NO_PAD.encode(signed_state.as_bytes()))
}

/// Verify the HMAC signature and decode the frontend URL from the state.
fn verify_and_decode_state(state: &str, secret: &[u8]) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Format is "frontend_url|timestamp_hex|signature_hex"
    let parts: Vec<&str> = state_str.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }

    let frontend_url = parts[0];
    let timestamp_hex = parts[1];
    let signature_hex = parts[2];

    let payload = format!("{}|{}", frontend_url, timestamp_hex);

    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(payload.as_bytes());

    let expected_signature = hex::encode(mac.finalize().into_bytes());

    if signature_hex != expected_signature {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    Some(frontend_url.to_string())
}
