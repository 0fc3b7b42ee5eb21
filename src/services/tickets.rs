// SPDX-License-Identifier: MIT

//! One-time login tickets for the redirect-based provider flow.
//!
//! The Facebook callback cannot return JSON to the browser, and putting
//! the session JWT in the redirect URL would leak it into history and
//! server logs. Instead the callback stores the login result under a
//! random single-use code and redirects with that code; the client then
//! exchanges it for `{token, user}` through the JSON path.

use crate::models::UserRecord;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::sync::Arc;

const CODE_LEN: usize = 32;
const DEFAULT_TTL_SECS: i64 = 60;

/// A completed login waiting to be claimed by the browser.
#[derive(Clone)]
struct LoginTicket {
    token: String,
    user: UserRecord,
    expires_at: DateTime<Utc>,
}

/// In-process store of one-time login tickets.
#[derive(Clone)]
pub struct TicketStore {
    tickets: Arc<DashMap<String, LoginTicket>>,
    ttl: Duration,
}

impl Default for TicketStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TicketStore {
    pub fn new() -> Self {
        Self::with_ttl(Duration::seconds(DEFAULT_TTL_SECS))
    }

    /// Store with a custom ticket lifetime (tests).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Store a login result and return its one-time code.
    pub fn issue(&self, token: String, user: UserRecord) -> String {
        self.sweep();

        let code: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(CODE_LEN)
            .map(char::from)
            .collect();

        self.tickets.insert(
            code.clone(),
            LoginTicket {
                token,
                user,
                expires_at: Utc::now() + self.ttl,
            },
        );

        code
    }

    /// Redeem a code, consuming it. Expired or unknown codes yield `None`.
    pub fn redeem(&self, code: &str) -> Option<(String, UserRecord)> {
        let (_, ticket) = self.tickets.remove(code)?;
        if ticket.expires_at < Utc::now() {
            return None;
        }
        Some((ticket.token, ticket.user))
    }

    /// Drop expired tickets; called lazily on issue.
    fn sweep(&self) {
        let now = Utc::now();
        self.tickets.retain(|_, ticket| ticket.expires_at >= now);
    }
}
