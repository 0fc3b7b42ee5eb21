// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations on the user directory.
//!
//! The one-record-per-email invariant is enforced by the store, not by
//! application-level check-then-act: every create (and every email change)
//! runs in a transaction against an index document in `user_emails` keyed
//! by the email itself. Concurrent first-logins with the same email
//! conflict at commit and the loser observes `DuplicateEmail`.

use crate::db::collections;
use crate::error::AppError;
use crate::models::UserRecord;
use firestore::FirestoreConsistencySelector;
use serde::{Deserialize, Serialize};

/// Index document mapping an email to its owning user record.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndex {
    user_id: String,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by record id.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a user by email (the natural key across all providers).
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        let email = email.to_string();
        let matches: Vec<UserRecord> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(matches.into_iter().next())
    }

    /// All records carrying an email. Anything beyond one element means the
    /// uniqueness invariant has been violated.
    pub async fn find_users_by_email(&self, email: &str) -> Result<Vec<UserRecord>, AppError> {
        let email = email.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::USERS)
            .filter(move |q| q.field("email").eq(email.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new user record, enforcing email uniqueness.
    ///
    /// Writes the record and its `user_emails` index document in a single
    /// transaction. If the email is already indexed, or a concurrent create
    /// wins the commit race, the caller gets `DuplicateEmail`.
    pub async fn create_user(&self, user: &UserRecord) -> Result<(), AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // The read must go through the transaction's consistency selector to
        // land in its read set; a plain select would leave the transaction
        // write-only and Firestore would never conflict-check it.
        let txn_client = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let existing: Option<EmailIndex> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&user.email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if existing.is_some() {
            let _ = transaction.rollback().await;
            return Err(AppError::DuplicateEmail);
        }

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::USER_EMAILS)
            .document_id(&user.email)
            .object(&EmailIndex {
                user_id: user.id.clone(),
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add email index to transaction: {}", e))
            })?;

        transaction.commit().await.map_err(map_commit_conflict)?;

        tracing::info!(user_id = %user.id, provider = %user.provider, "User record created");
        Ok(())
    }

    /// Partial-field update: writes only the named fields of the record.
    ///
    /// Used by provider-metadata reconciliation to keep write volume down.
    /// Field names must match the serialized (snake_case) names.
    pub async fn update_user_fields(
        &self,
        user: &UserRecord,
        fields: &[&str],
    ) -> Result<(), AppError> {
        let field_paths: Vec<String> = fields.iter().map(|f| f.to_string()).collect();

        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(field_paths)
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Full overwrite of a user record (the explicit profile-edit path).
    ///
    /// When the edit changes the email, the index document is moved in a
    /// transaction so uniqueness still holds; a taken email fails with
    /// `DuplicateEmail`.
    pub async fn update_user(
        &self,
        user: &UserRecord,
        previous_email: &str,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;

        if user.email == previous_email {
            let _: () = client
                .fluent()
                .update()
                .in_col(collections::USERS)
                .document_id(&user.id)
                .object(user)
                .execute()
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(());
        }

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Transactional read, same as create_user: the index doc has to be
        // in the read set for the commit to detect a concurrent claim.
        let txn_client = client.clone_with_consistency_selector(
            FirestoreConsistencySelector::Transaction(transaction.transaction_id().clone()),
        );

        let taken: Option<EmailIndex> = txn_client
            .fluent()
            .select()
            .by_id_in(collections::USER_EMAILS)
            .obj()
            .one(&user.email)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if taken.is_some_and(|index| index.user_id != user.id) {
            let _ = transaction.rollback().await;
            return Err(AppError::DuplicateEmail);
        }

        client
            .fluent()
            .delete()
            .from(collections::USER_EMAILS)
            .document_id(previous_email)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add index delete to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::USER_EMAILS)
            .document_id(&user.email)
            .object(&EmailIndex {
                user_id: user.id.clone(),
            })
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add email index to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.id)
            .object(user)
            .add_to_transaction(&mut transaction)
            .map_err(|e| AppError::Database(format!("Failed to add user to transaction: {}", e)))?;

        transaction.commit().await.map_err(map_commit_conflict)?;

        tracing::info!(
            user_id = %user.id,
            previous_email = %previous_email,
            "User email changed, index moved"
        );
        Ok(())
    }
}

/// Map a transaction commit failure to the directory error taxonomy.
///
/// A contended commit (another transaction touched the email index) is the
/// store telling us the uniqueness race was lost.
fn map_commit_conflict(err: firestore::errors::FirestoreError) -> AppError {
    let msg = err.to_string();
    let lowered = msg.to_lowercase();
    if lowered.contains("aborted") || lowered.contains("already exists") {
        AppError::DuplicateEmail
    } else {
        AppError::Database(format!("Transaction commit failed: {}", msg))
    }
}
