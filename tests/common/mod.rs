// SPDX-License-Identifier: MIT

use dashboard_auth::config::Config;
use dashboard_auth::db::FirestoreDb;
use dashboard_auth::routes::create_router;
use dashboard_auth::services::{DirectoryService, FacebookClient, GoogleVerifier, TicketStore};
use dashboard_auth::AppState;
use std::sync::Arc;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let facebook = FacebookClient::new(
        config.facebook_app_id.clone(),
        config.facebook_app_secret.clone(),
    );
    build_test_app(config, facebook)
}

/// Create a test app whose Facebook client points at an unroutable
/// endpoint, so any real provider call fails immediately.
#[allow(dead_code)]
pub fn create_test_app_with_dead_facebook() -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let facebook = FacebookClient::with_base_urls(
        config.facebook_app_id.clone(),
        config.facebook_app_secret.clone(),
        "http://127.0.0.1:1".to_string(),
        "http://127.0.0.1:1".to_string(),
    );
    build_test_app(config, facebook)
}

/// Create a test app with an injected Google verifier and database
/// (static-key verifier + emulator db for end-to-end login tests).
#[allow(dead_code)]
pub fn create_test_app_with_google(
    google: Arc<GoogleVerifier>,
    db: FirestoreDb,
) -> (axum::Router, Arc<AppState>) {
    let config = Config::test_default();
    let facebook = FacebookClient::new(
        config.facebook_app_id.clone(),
        config.facebook_app_secret.clone(),
    );
    let directory = DirectoryService::new(db.clone());
    let tickets = TicketStore::new();

    let state = Arc::new(AppState {
        config,
        db,
        google,
        facebook,
        directory,
        tickets,
    });

    (create_router(state.clone()), state)
}

#[allow(dead_code)]
fn build_test_app(config: Config, facebook: FacebookClient) -> (axum::Router, Arc<AppState>) {
    let db = test_db_offline();
    let google =
        Arc::new(GoogleVerifier::new(&config).expect("Failed to build Google verifier"));
    let directory = DirectoryService::new(db.clone());
    let tickets = TicketStore::new();

    let state = Arc::new(AppState {
        config,
        db,
        google,
        facebook,
        directory,
        tickets,
    });

    (create_router(state.clone()), state)
}
