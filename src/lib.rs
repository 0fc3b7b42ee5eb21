// SPDX-License-Identifier: MIT

//! Dashboard-Auth: identity federation and session issuance for the admin dashboard.
//!
//! This crate provides the backend API that verifies Google ID tokens,
//! drives the Facebook authorization-code flow, keeps the user directory
//! (one record per email) in Firestore, and issues JWT session tokens.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod session;

use config::Config;
use db::FirestoreDb;
use services::{DirectoryService, FacebookClient, GoogleVerifier, TicketStore};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub google: Arc<GoogleVerifier>,
    pub facebook: FacebookClient,
    pub directory: DirectoryService,
    pub tickets: TicketStore,
}
