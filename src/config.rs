//! Application configuration loaded from environment variables.
//!
//! Secrets (JWT signing key, Facebook app secret, OAuth state key) are
//! read once at startup and held in memory for the process lifetime.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL of this service (OAuth redirect URIs derive from it)
    pub base_url: String,
    /// Browser app origin, for CORS and post-login redirects
    pub frontend_url: String,
    /// Google OAuth client ID (audience for ID-token verification)
    pub google_client_id: String,
    /// Facebook OAuth app ID (public)
    pub facebook_app_id: String,
    /// GCP project ID for Firestore
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// Facebook OAuth app secret
    pub facebook_app_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for signing the OAuth state parameter
    pub oauth_state_key: Vec<u8>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// For local development a `.env` file is honored if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let base_url =
            env::var("BASE_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());
        let frontend_url = env::var("FRONTEND_URL").unwrap_or_else(|_| base_url.clone());

        Ok(Self {
            google_client_id: env::var("GOOGLE_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_CLIENT_ID"))?,
            facebook_app_id: env::var("FACEBOOK_APP_ID")
                .map_err(|_| ConfigError::Missing("FACEBOOK_APP_ID"))?,
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .unwrap_or(3000),

            facebook_app_secret: env::var("FACEBOOK_APP_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("FACEBOOK_APP_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map_err(|_| ConfigError::Missing("OAUTH_STATE_KEY"))?
                .into_bytes(),

            base_url,
            frontend_url,
        })
    }

    /// Fixed configuration for tests.
    pub fn test_default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            google_client_id: "test-google-client-id.apps.googleusercontent.com".to_string(),
            facebook_app_id: "test_fb_app_id".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 3000,
            facebook_app_secret: "test_fb_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
