// SPDX-License-Identifier: MIT

//! User directory resolution: lookup-or-create plus provider-metadata
//! reconciliation over the Firestore-backed store.

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{NormalizedProfile, UserRecord};
use serde::Deserialize;
use validator::Validate;

/// High-level directory service enforcing one record per email.
#[derive(Clone)]
pub struct DirectoryService {
    db: FirestoreDb,
}

impl DirectoryService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Resolve a normalized profile to a directory record.
    ///
    /// Creates the record on a never-seen email; reconciles provider
    /// metadata on an existing one. A `DuplicateEmail` from the store means
    /// a concurrent first-login won the create race, so the loser falls
    /// back to a lookup and continues as a reconciling login.
    ///
    /// Returns the record and whether it was newly created.
    pub async fn resolve_or_create(
        &self,
        profile: NormalizedProfile,
    ) -> Result<(UserRecord, bool), AppError> {
        if let Some(existing) = self.db.find_user_by_email(&profile.email).await? {
            let user = self.reconcile(existing, &profile).await?;
            return Ok((user, false));
        }

        let record = UserRecord::from_profile(&profile);
        match self.db.create_user(&record).await {
            Ok(()) => Ok((record, true)),
            Err(AppError::DuplicateEmail) => {
                tracing::info!(email = %profile.email, "Lost first-login race, continuing as lookup");
                let winner = self
                    .db
                    .find_user_by_email(&profile.email)
                    .await?
                    .ok_or_else(|| {
                        AppError::Database(
                            "email index present but user record missing".to_string(),
                        )
                    })?;
                let user = self.reconcile(winner, &profile).await?;
                Ok((user, false))
            }
            Err(e) => Err(e),
        }
    }

    /// Apply provider metadata from a login to an existing record.
    ///
    /// Only fields that actually differ are written; a repeat application
    /// with the same profile performs zero writes.
    pub async fn reconcile(
        &self,
        mut user: UserRecord,
        profile: &NormalizedProfile,
    ) -> Result<UserRecord, AppError> {
        let mut changed = provider_updates(&user, profile);
        if changed.is_empty() {
            return Ok(user);
        }

        user.provider = profile.provider;
        user.provider_id = profile.provider_id.clone();
        if let Some(avatar) = &profile.avatar {
            user.avatar = Some(avatar.clone());
        }
        user.updated_at = chrono::Utc::now().to_rfc3339();
        changed.push("updated_at");

        tracing::info!(
            user_id = %user.id,
            provider = %user.provider,
            fields = ?changed,
            "Reconciling provider metadata"
        );

        self.db.update_user_fields(&user, &changed).await?;
        Ok(user)
    }

    /// Explicit user-initiated profile edit.
    ///
    /// Overwrites unconditionally; the only validation is required-field
    /// presence, performed by the caller via [`ProfileEdit::validate`].
    pub async fn update_profile(
        &self,
        user_id: &str,
        edit: ProfileEdit,
    ) -> Result<UserRecord, AppError> {
        let mut user = self
            .db
            .get_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let previous_email = user.email.clone();

        user.name = edit.name;
        user.email = edit.email;
        user.birthday = edit.birthday;
        user.phone = edit.phone;
        user.address = edit.address;
        user.updated_at = chrono::Utc::now().to_rfc3339();

        self.db.update_user(&user, &previous_email).await?;
        Ok(user)
    }
}

/// Compute which provider-sourced fields a login would change.
///
/// Field names match the serialized record fields so they can be passed
/// straight to the partial-update write.
fn provider_updates(user: &UserRecord, profile: &NormalizedProfile) -> Vec<&'static str> {
    let mut changed = Vec::new();

    if user.provider != profile.provider {
        changed.push("provider");
    }
    if user.provider_id != profile.provider_id {
        changed.push("provider_id");
    }
    if let Some(avatar) = &profile.avatar {
        if user.avatar.as_deref() != Some(avatar.as_str()) {
            changed.push("avatar");
        }
    }

    changed
}

/// Body of the profile-edit request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ProfileEdit {
    #[validate(length(min = 1, message = "name is required"))]
    pub name: String,
    #[validate(email(message = "a valid email is required"))]
    pub email: String,
    #[serde(default)]
    pub birthday: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
}
