// SPDX-License-Identifier: MIT

//! Client-side session state with persisted hydration.
//!
//! The dashboard previously kept two independent copies of
//! `{user, token, isAuthenticated}` in separate state containers, both
//! mirroring the same persisted keys; they could silently diverge. This
//! module is the single session contract any UI surface reads through:
//! one store, one hydrate/login/logout lifecycle, one invariant
//! (`is_authenticated` holds exactly when both user and token are present).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Persisted storage key for the session token.
pub const TOKEN_KEY: &str = "token";
/// Persisted storage key for the serialized user projection.
pub const USER_KEY: &str = "user";

/// User projection held client-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub role: Option<String>,
}

/// Persisted key-value storage behind the session store (browser
/// localStorage, a settings file, or an in-memory map in tests).
pub trait SessionStorage {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str);
    fn remove(&mut self, key: &str);
}

/// In-memory storage, used by tests and native clients.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

/// The single client-side session store.
pub struct SessionStore<S: SessionStorage> {
    storage: S,
    user: Option<SessionUser>,
    token: Option<String>,
    is_authenticated: bool,
    is_hydrated: bool,
}

impl<S: SessionStorage> SessionStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            user: None,
            token: None,
            is_authenticated: false,
            is_hydrated: false,
        }
    }

    /// Restore session state from persisted storage.
    ///
    /// Only the first call reads storage; later calls are no-ops so a
    /// `logout`/`login` that happened in the meantime is never clobbered
    /// by a stale rehydration. Corrupt persisted user JSON hydrates as
    /// absent.
    pub fn hydrate(&mut self) {
        if self.is_hydrated {
            return;
        }

        let token = self.storage.get(TOKEN_KEY);
        let user = self
            .storage
            .get(USER_KEY)
            .and_then(|raw| serde_json::from_str::<SessionUser>(&raw).ok());

        self.is_authenticated = user.is_some() && token.is_some();
        self.user = user;
        self.token = token;
        self.is_hydrated = true;
    }

    /// Unconditionally overwrite the session and persist it.
    ///
    /// A login without a token also clears any previously persisted token,
    /// so a reload can never pair the new user with a stale one.
    pub fn login(&mut self, user: SessionUser, token: Option<String>) {
        match &token {
            Some(token) => self.storage.set(TOKEN_KEY, token),
            None => self.storage.remove(TOKEN_KEY),
        }
        if let Ok(serialized) = serde_json::to_string(&user) {
            self.storage.set(USER_KEY, &serialized);
        }

        self.is_authenticated = token.is_some();
        self.user = Some(user);
        self.token = token;
        self.is_hydrated = true;
    }

    /// Clear the session and persisted storage.
    ///
    /// Purely client-side; the server keeps no session state to invalidate.
    pub fn logout(&mut self) {
        self.storage.remove(TOKEN_KEY);
        self.storage.remove(USER_KEY);

        self.user = None;
        self.token = None;
        self.is_authenticated = false;
        self.is_hydrated = true;
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.user.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated
    }

    /// Whether persisted state has been restored; UIs wait for this before
    /// deciding to redirect to the login page.
    pub fn is_hydrated(&self) -> bool {
        self.is_hydrated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> SessionUser {
        SessionUser {
            name: name.to_string(),
            email: format!("{}@x.com", name),
            role: Some("User".to_string()),
        }
    }

    fn seeded_storage() -> MemoryStorage {
        let mut storage = MemoryStorage::default();
        storage.set(TOKEN_KEY, "persisted-token");
        storage.set(USER_KEY, &serde_json::to_string(&user("a")).unwrap());
        storage
    }

    #[test]
    fn hydrate_restores_persisted_session() {
        let mut store = SessionStore::new(seeded_storage());
        assert!(!store.is_hydrated());

        store.hydrate();

        assert!(store.is_hydrated());
        assert!(store.is_authenticated());
        assert_eq!(store.token(), Some("persisted-token"));
        assert_eq!(store.user().unwrap().email, "a@x.com");
    }

    #[test]
    fn hydrate_is_idempotent() {
        let mut store = SessionStore::new(seeded_storage());
        store.hydrate();

        // A later logout must not be clobbered by a stale rehydration
        store.logout();
        store.hydrate();

        assert!(store.user().is_none());
        assert!(store.token().is_none());
        assert!(!store.is_authenticated());
        assert!(store.is_hydrated());
    }

    #[test]
    fn hydrate_empty_storage_confirms_absence() {
        let mut store = SessionStore::new(MemoryStorage::default());
        store.hydrate();

        assert!(store.is_hydrated());
        assert!(!store.is_authenticated());
        assert!(store.user().is_none());
    }

    #[test]
    fn hydrate_with_corrupt_user_json() {
        let mut storage = MemoryStorage::default();
        storage.set(TOKEN_KEY, "t");
        storage.set(USER_KEY, "{not json");

        let mut store = SessionStore::new(storage);
        store.hydrate();

        assert!(store.user().is_none());
        // Token alone is not an authenticated session
        assert!(!store.is_authenticated());
    }

    #[test]
    fn login_overwrites_and_persists() {
        let mut store = SessionStore::new(seeded_storage());
        store.hydrate();

        store.login(user("b"), Some("new-token".to_string()));

        assert!(store.is_authenticated());
        assert_eq!(store.user().unwrap().name, "b");
        assert_eq!(store.token(), Some("new-token"));
    }

    #[test]
    fn login_without_token_is_not_authenticated() {
        let mut store = SessionStore::new(MemoryStorage::default());
        store.login(user("b"), None);

        // user and token must BOTH be present for an authenticated session
        assert!(!store.is_authenticated());
        assert!(store.user().is_some());
    }

    #[test]
    fn login_without_token_clears_persisted_token() {
        let mut first = SessionStore::new(seeded_storage());
        first.hydrate();
        first.login(user("b"), None);

        // A reload over the same storage must not resurrect the old token
        // alongside the new user
        let mut second = SessionStore::new(first.storage);
        second.hydrate();

        assert_eq!(second.user().unwrap().name, "b");
        assert!(second.token().is_none());
        assert!(!second.is_authenticated());
    }

    #[test]
    fn logout_then_fresh_hydrate_reads_cleared_storage() {
        let mut first = SessionStore::new(seeded_storage());
        first.hydrate();
        first.logout();

        // Simulate a reload sharing the same (now cleared) storage
        let mut second = SessionStore::new(first.storage);
        second.hydrate();

        assert!(second.user().is_none());
        assert!(second.token().is_none());
        assert!(!second.is_authenticated());
        assert!(second.is_hydrated());
    }

    #[test]
    fn authenticated_invariant_holds_in_every_state() {
        let mut store = SessionStore::new(seeded_storage());

        let check = |store: &SessionStore<MemoryStorage>| {
            assert_eq!(
                store.is_authenticated(),
                store.user().is_some() && store.token().is_some()
            );
        };

        check(&store);
        store.hydrate();
        check(&store);
        store.login(user("b"), Some("t".to_string()));
        check(&store);
        store.login(user("c"), None);
        check(&store);
        store.logout();
        check(&store);
        store.hydrate();
        check(&store);
    }
}
