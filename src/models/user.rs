//! User directory record and the normalized provider profile.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Identity provider that authenticated a login.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Local,
    Google,
    Facebook,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::Local => write!(f, "local"),
            Provider::Google => write!(f, "google"),
            Provider::Facebook => write!(f, "facebook"),
        }
    }
}

/// Durable identity entity stored in Firestore, one per email.
///
/// `id` is store-assigned and immutable; `email` is the natural key across
/// all providers. Provider metadata is reconciled on cross-provider logins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    /// Document ID (UUIDv4, assigned at creation)
    pub id: String,
    pub name: String,
    /// Globally unique, enforced via the `user_emails` index collection
    pub email: String,
    /// Avatar URL, if the provider supplied one
    pub avatar: Option<String>,
    pub role: String,
    pub provider: Provider,
    /// Opaque identifier issued by the provider
    pub provider_id: String,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    /// bcrypt hash; present only for records with local credentials
    #[serde(default)]
    pub password_hash: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl UserRecord {
    /// Build a brand-new record from a normalized provider profile.
    pub fn from_profile(profile: &NormalizedProfile) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: profile.name.clone(),
            email: profile.email.clone(),
            avatar: profile.avatar.clone(),
            role: "User".to_string(),
            provider: profile.provider,
            provider_id: profile.provider_id.clone(),
            birthday: profile.birthday.clone(),
            phone: profile.phone.clone(),
            address: profile.address.clone(),
            password_hash: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Provider-independent profile produced by the identity provider clients.
#[derive(Debug, Clone)]
pub struct NormalizedProfile {
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub provider: Provider,
    pub provider_id: String,
    pub birthday: String,
    pub phone: String,
    pub address: String,
}

impl NormalizedProfile {
    pub fn new(provider: Provider, provider_id: impl Into<String>) -> Self {
        Self {
            name: String::new(),
            email: String::new(),
            avatar: None,
            provider,
            provider_id: provider_id.into(),
            birthday: String::new(),
            phone: String::new(),
            address: String::new(),
        }
    }
}

/// User projection returned over HTTP (never exposes credential material).
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub role: String,
    pub provider: Provider,
    pub provider_id: String,
    pub birthday: String,
    pub phone: String,
    pub address: String,
}

impl From<UserRecord> for UserResponse {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            avatar: user.avatar,
            role: user.role,
            provider: user.provider,
            provider_id: user.provider_id,
            birthday: user.birthday,
            phone: user.phone,
            address: user.address,
        }
    }
}
