// SPDX-License-Identifier: MIT

//! Facebook Graph API client for the authorization-code login flow.
//!
//! Handles:
//! - Building the provider authorization URL
//! - Server-side code -> access-token exchange
//! - Profile fetch and normalization (with placeholder email synthesis
//!   when the provider withholds the email)

use crate::error::AppError;
use crate::models::{NormalizedProfile, Provider};
use serde::Deserialize;
use std::time::Duration;

const GRAPH_BASE_URL: &str = "https://graph.facebook.com";
const DIALOG_BASE_URL: &str = "https://www.facebook.com";
const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Facebook Graph API client.
#[derive(Clone)]
pub struct FacebookClient {
    http: reqwest::Client,
    graph_base_url: String,
    dialog_base_url: String,
    app_id: String,
    app_secret: String,
}

impl FacebookClient {
    /// Create a new client with OAuth app credentials.
    pub fn new(app_id: String, app_secret: String) -> Self {
        Self::with_base_urls(
            app_id,
            app_secret,
            GRAPH_BASE_URL.to_string(),
            DIALOG_BASE_URL.to_string(),
        )
    }

    /// Create a client against alternate endpoints (tests, emulation).
    pub fn with_base_urls(
        app_id: String,
        app_secret: String,
        graph_base_url: String,
        dialog_base_url: String,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            graph_base_url,
            dialog_base_url,
            app_id,
            app_secret,
        }
    }

    /// Build the provider authorization URL for the redirect entry point.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/v18.0/dialog/oauth?\
             client_id={}&\
             redirect_uri={}&\
             scope=email,public_profile&\
             response_type=code&\
             state={}",
            self.dialog_base_url,
            self.app_id,
            urlencoding::encode(redirect_uri),
            state
        )
    }

    /// Exchange an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str, redirect_uri: &str) -> Result<String, AppError> {
        let url = format!("{}/v18.0/oauth/access_token", self.graph_base_url);

        let response = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .query(&[
                ("client_id", self.app_id.as_str()),
                ("redirect_uri", redirect_uri),
                ("client_secret", self.app_secret.as_str()),
                ("code", code),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProviderExchange(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| AppError::ProviderExchange(e.to_string()))?;

        let token: TokenResponse = serde_json::from_str(&body).unwrap_or_default();

        match token.access_token {
            Some(access_token) => Ok(access_token),
            None => {
                tracing::warn!(response = %body, "Facebook token exchange failed");
                Err(AppError::ProviderExchange(body))
            }
        }
    }

    /// Fetch the user profile with an access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<FacebookProfile, AppError> {
        let url = format!("{}/me", self.graph_base_url);

        let response = self
            .http
            .get(&url)
            .timeout(HTTP_TIMEOUT)
            .query(&[
                ("fields", "id,name,email,picture"),
                ("access_token", access_token),
            ])
            .send()
            .await
            .map_err(|e| AppError::ProfileFetch(e.to_string()))?;

        let profile: FacebookProfile = response
            .json()
            .await
            .map_err(|e| AppError::ProfileFetch(format!("JSON parse error: {}", e)))?;

        if let Some(error) = &profile.error {
            tracing::warn!(error = %error.message, "Facebook profile fetch returned error");
            return Err(AppError::ProfileFetch(error.message.clone()));
        }

        Ok(profile)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Graph API `me` response.
#[derive(Debug, Clone, Deserialize)]
pub struct FacebookProfile {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub email: Option<String>,
    pub picture: Option<FacebookPicture>,
    pub error: Option<GraphError>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPicture {
    pub data: Option<FacebookPictureData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FacebookPictureData {
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphError {
    #[serde(default)]
    pub message: String,
}

impl FacebookProfile {
    /// Normalize into the provider-independent profile shape.
    ///
    /// Facebook may withhold the email; a deterministic placeholder of the
    /// form `<id>@facebook.com` keeps the one-record-per-email invariant
    /// applicable.
    pub fn normalize(self) -> NormalizedProfile {
        let email = self
            .email
            .unwrap_or_else(|| format!("{}@facebook.com", self.id));

        let avatar = self
            .picture
            .and_then(|picture| picture.data)
            .and_then(|data| data.url);

        let mut profile = NormalizedProfile::new(Provider::Facebook, self.id);
        profile.name = self.name;
        profile.email = email;
        profile.avatar = avatar;
        profile
    }
}
