// SPDX-License-Identifier: MIT

//! Google ID-token verification and People API enrichment.
//!
//! The dashboard login page obtains an ID token from Google Sign-In and
//! posts it to `/api/auth`. This module verifies the token against
//! Google's JWKS (with OIDC discovery and Cache-Control-driven caching)
//! and maps the claims to a [`NormalizedProfile`].

use crate::config::Config;
use crate::error::AppError;
use crate::models::{NormalizedProfile, Provider};
use anyhow::Context;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::header::CACHE_CONTROL;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

const DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
const DEFAULT_JWKS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const PEOPLE_API_URL: &str =
    "https://people.googleapis.com/v1/people/me?personFields=birthdays,phoneNumbers,addresses";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const CLOCK_SKEW_SECS: u64 = 60;

#[derive(Clone)]
enum VerifierMode {
    Google,
    StaticKey {
        kid: String,
        decoding_key: Arc<DecodingKey>,
    },
}

#[derive(Clone)]
struct DiscoveryCacheEntry {
    jwks_uri: String,
    expires_at: Instant,
}

#[derive(Clone)]
struct JwksCacheEntry {
    keys_by_kid: HashMap<String, Arc<DecodingKey>>,
    expires_at: Instant,
}

/// Verifier for Google Sign-In ID tokens.
pub struct GoogleVerifier {
    http_client: reqwest::Client,
    expected_audience: String,
    people_api_url: String,
    mode: VerifierMode,
    discovery_cache: RwLock<Option<DiscoveryCacheEntry>>,
    jwks_cache: RwLock<Option<JwksCacheEntry>>,
    refresh_lock: Mutex<()>,
}

impl GoogleVerifier {
    /// Create a production verifier that discovers and caches Google JWKS keys.
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google HTTP client")?;

        Ok(Self {
            http_client,
            expected_audience: config.google_client_id.clone(),
            people_api_url: PEOPLE_API_URL.to_string(),
            mode: VerifierMode::Google,
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Create a verifier with a static RSA public key.
    ///
    /// This is intended for deterministic local/integration tests.
    pub fn new_with_static_key(
        config: &Config,
        kid: impl Into<String>,
        decoding_key: DecodingKey,
    ) -> anyhow::Result<Self> {
        let kid = kid.into();
        if kid.trim().is_empty() {
            anyhow::bail!("static kid must not be empty");
        }

        let http_client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .context("failed building Google HTTP client")?;

        Ok(Self {
            http_client,
            expected_audience: config.google_client_id.clone(),
            people_api_url: PEOPLE_API_URL.to_string(),
            mode: VerifierMode::StaticKey {
                kid,
                decoding_key: Arc::new(decoding_key),
            },
            discovery_cache: RwLock::new(None),
            jwks_cache: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    /// Verify a Google ID token and map its claims to a normalized profile.
    ///
    /// Signature, issuer, audience and expiry are all checked; a payload
    /// without `email` or `name` is rejected as an invalid token.
    pub async fn verify_id_token(&self, id_token: &str) -> Result<NormalizedProfile, AppError> {
        let header = decode_header(id_token).map_err(|e| {
            tracing::warn!(error = %e, "Invalid Google ID token header");
            AppError::InvalidToken
        })?;

        if header.alg != Algorithm::RS256 {
            tracing::warn!(alg = ?header.alg, "Unexpected Google ID token alg");
            return Err(AppError::InvalidToken);
        }

        let kid = header.kid.ok_or(AppError::InvalidToken)?;
        let decoding_key = self.decoding_key_for_kid(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&["https://accounts.google.com", "accounts.google.com"]);
        validation.set_audience(&[self.expected_audience.as_str()]);
        validation.leeway = CLOCK_SKEW_SECS;

        let token_data = decode::<GoogleIdTokenClaims>(id_token, decoding_key.as_ref(), &validation)
            .map_err(|e| {
                tracing::warn!(error = %e, "Google ID token validation failed");
                AppError::InvalidToken
            })?;

        profile_from_claims(token_data.claims)
    }

    /// Best-effort People API call for birthday/phone/address enrichment.
    ///
    /// Only attempted when a brand-new record is being created. Any failure
    /// skips enrichment; it must never abort the login.
    pub async fn fetch_person(&self, bearer_token: &str) -> Option<PersonEnrichment> {
        let response = self
            .http_client
            .get(&self.people_api_url)
            .bearer_auth(bearer_token)
            .send()
            .await;

        let response = match response {
            Ok(resp) if resp.status().is_success() => resp,
            Ok(resp) => {
                tracing::warn!(status = %resp.status(), "People API returned non-success, skipping enrichment");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "People API request failed, skipping enrichment");
                return None;
            }
        };

        let person: PersonResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid People API JSON, skipping enrichment");
                return None;
            }
        };

        Some(PersonEnrichment::from(person))
    }

    async fn decoding_key_for_kid(&self, kid: &str) -> Result<Arc<DecodingKey>, AppError> {
        match &self.mode {
            VerifierMode::StaticKey {
                kid: static_kid,
                decoding_key,
            } => {
                if kid == static_kid {
                    return Ok(decoding_key.clone());
                }
                return Err(AppError::InvalidToken);
            }
            VerifierMode::Google => {}
        }

        if let Some(key) = self.lookup_cached_key(kid).await {
            return Ok(key);
        }

        for force_refresh in [false, true] {
            self.refresh_jwks(force_refresh).await?;
            if let Some(key) = self.lookup_cached_key(kid).await {
                return Ok(key);
            }
        }

        tracing::warn!(kid = %kid, "JWT kid not found in Google JWKS after refresh");
        Err(AppError::InvalidToken)
    }

    async fn lookup_cached_key(&self, kid: &str) -> Option<Arc<DecodingKey>> {
        let cache = self.jwks_cache.read().await;
        let now = Instant::now();
        cache
            .as_ref()
            .filter(|entry| entry.expires_at > now)
            .and_then(|entry| entry.keys_by_kid.get(kid))
            .cloned()
    }

    async fn refresh_jwks(&self, force_refresh: bool) -> Result<(), AppError> {
        let _guard = self.refresh_lock.lock().await;

        if !force_refresh {
            let cache = self.jwks_cache.read().await;
            if cache
                .as_ref()
                .is_some_and(|entry| entry.expires_at > Instant::now())
            {
                return Ok(());
            }
        }

        let jwks_uri = self.resolve_jwks_uri(force_refresh).await?;

        tracing::debug!(jwks_uri = %jwks_uri, "Refreshing Google JWKS cache");

        let response = self
            .http_client
            .get(&jwks_uri)
            .send()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWKS request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "JWKS request returned status {}",
                response.status()
            )));
        }

        let ttl = cache_ttl_from_headers(response.headers(), DEFAULT_CACHE_TTL);

        let jwks: Jwks = response
            .json()
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("invalid JWKS JSON: {}", e)))?;

        let mut keys_by_kid: HashMap<String, Arc<DecodingKey>> = HashMap::new();

        for jwk in jwks.keys {
            if jwk.kty != "RSA" {
                continue;
            }
            if jwk.kid.trim().is_empty() {
                continue;
            }
            if let Some(alg) = &jwk.alg {
                if alg != "RS256" {
                    continue;
                }
            }
            if let Some(use_) = &jwk.use_ {
                if use_ != "sig" {
                    continue;
                }
            }

            match DecodingKey::from_rsa_components(&jwk.n, &jwk.e) {
                Ok(key) => {
                    keys_by_kid.insert(jwk.kid, Arc::new(key));
                }
                Err(e) => {
                    tracing::warn!(error = %e, kid = %jwk.kid, "Skipping invalid RSA JWKS key");
                }
            }
        }

        if keys_by_kid.is_empty() {
            return Err(AppError::Internal(anyhow::anyhow!(
                "JWKS response did not include any usable RSA keys"
            )));
        }

        let entry = JwksCacheEntry {
            keys_by_kid,
            expires_at: Instant::now() + ttl,
        };

        *self.jwks_cache.write().await = Some(entry);

        tracing::debug!(ttl_secs = ttl.as_secs(), "Google JWKS cache refreshed");
        Ok(())
    }

    async fn resolve_jwks_uri(&self, force_refresh: bool) -> Result<String, AppError> {
        if !force_refresh {
            let cache = self.discovery_cache.read().await;
            if let Some(entry) = cache
                .as_ref()
                .filter(|entry| entry.expires_at > Instant::now())
            {
                return Ok(entry.jwks_uri.clone());
            }
        }

        let cached_jwks_uri = self
            .discovery_cache
            .read()
            .await
            .as_ref()
            .map(|entry| entry.jwks_uri.clone());

        let response = self.http_client.get(DISCOVERY_URL).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                let ttl = cache_ttl_from_headers(resp.headers(), DEFAULT_CACHE_TTL);
                let discovery: OpenIdConfig = resp.json().await.map_err(|e| {
                    AppError::Internal(anyhow::anyhow!("invalid discovery JSON: {}", e))
                })?;

                *self.discovery_cache.write().await = Some(DiscoveryCacheEntry {
                    jwks_uri: discovery.jwks_uri.clone(),
                    expires_at: Instant::now() + ttl,
                });

                Ok(discovery.jwks_uri)
            }
            Ok(resp) => {
                tracing::warn!(
                    status = %resp.status(),
                    "OIDC discovery returned non-success status; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()))
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "OIDC discovery request failed; using fallback JWKS URI"
                );
                Ok(cached_jwks_uri.unwrap_or_else(|| DEFAULT_JWKS_URL.to_string()))
            }
        }
    }
}

/// Map verified Google claims to the provider-independent profile shape.
fn profile_from_claims(claims: GoogleIdTokenClaims) -> Result<NormalizedProfile, AppError> {
    let (Some(email), Some(name)) = (claims.email, claims.name) else {
        return Err(AppError::InvalidToken);
    };

    let mut profile = NormalizedProfile::new(Provider::Google, claims.sub);
    profile.email = email;
    profile.name = name;
    profile.avatar = claims.picture;
    Ok(profile)
}

#[derive(Debug, Deserialize)]
struct OpenIdConfig {
    jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Jwk {
    kid: String,
    kty: String,
    alg: Option<String>,
    n: String,
    e: String,
    #[serde(rename = "use")]
    use_: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    #[allow(dead_code)]
    iss: String,
    #[allow(dead_code)]
    aud: String,
    sub: String,
    #[allow(dead_code)]
    exp: usize,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

// ─── People API enrichment ───────────────────────────────────────────────────

/// Extra profile fields pulled from the People API on first login.
#[derive(Debug, Clone, Default)]
pub struct PersonEnrichment {
    pub birthday: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PersonResponse {
    #[serde(default)]
    birthdays: Vec<PersonBirthday>,
    #[serde(default)]
    phone_numbers: Vec<PersonPhone>,
    #[serde(default)]
    addresses: Vec<PersonAddress>,
}

#[derive(Debug, Deserialize, Default)]
struct PersonBirthday {
    date: Option<PersonDate>,
}

#[derive(Debug, Deserialize, Default)]
struct PersonDate {
    year: Option<u32>,
    month: Option<u32>,
    day: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PersonPhone {
    value: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PersonAddress {
    formatted_value: Option<String>,
}

impl From<PersonResponse> for PersonEnrichment {
    fn from(person: PersonResponse) -> Self {
        let birthday = person
            .birthdays
            .first()
            .and_then(|b| b.date.as_ref())
            .map(format_birthday)
            .unwrap_or_default();

        let phone = person
            .phone_numbers
            .first()
            .and_then(|p| p.value.clone())
            .unwrap_or_default();

        let address = person
            .addresses
            .first()
            .and_then(|a| a.formatted_value.clone())
            .unwrap_or_default();

        Self {
            birthday,
            phone,
            address,
        }
    }
}

/// Format a People API date as `year-month-day`, with missing parts empty.
fn format_birthday(date: &PersonDate) -> String {
    let part = |value: Option<u32>| value.map(|v| v.to_string()).unwrap_or_default();
    format!(
        "{}-{}-{}",
        part(date.year),
        part(date.month),
        part(date.day)
    )
}

fn cache_ttl_from_headers(headers: &reqwest::header::HeaderMap, fallback: Duration) -> Duration {
    let Some(max_age) = headers
        .get(CACHE_CONTROL)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_cache_control_max_age)
    else {
        return fallback;
    };

    Duration::from_secs(max_age)
}

fn parse_cache_control_max_age(value: &str) -> Option<u64> {
    for directive in value.split(',') {
        let directive = directive.trim();

        if let Some(raw) = directive.strip_prefix("max-age=") {
            let raw = raw.trim_matches('"');
            if let Ok(seconds) = raw.parse::<u64>() {
                return Some(seconds);
            }
        }
    }

    None
}
