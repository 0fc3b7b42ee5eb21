//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    /// Email uniqueness index (keyed by email, holds the owning user id)
    pub const USER_EMAILS: &str = "user_emails";
}
