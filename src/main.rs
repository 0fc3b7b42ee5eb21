// SPDX-License-Identifier: MIT

//! Dashboard-Auth API Server
//!
//! Federates Google and Facebook identities into a single user directory
//! and issues JWT session tokens for the admin dashboard.

use dashboard_auth::{
    config::Config,
    db::FirestoreDb,
    services::{DirectoryService, FacebookClient, GoogleVerifier, TicketStore},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Dashboard-Auth API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let google = Arc::new(GoogleVerifier::new(&config).expect("Failed to initialize Google verifier"));

    let facebook = FacebookClient::new(
        config.facebook_app_id.clone(),
        config.facebook_app_secret.clone(),
    );

    let directory = DirectoryService::new(db.clone());

    // One-time login codes for the OAuth redirect flow
    let tickets = TicketStore::new();

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        google,
        facebook,
        directory,
        tickets,
    });

    // Build router
    let app = dashboard_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dashboard_auth=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
