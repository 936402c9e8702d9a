//! Auth state store.
//!
//! The single place that remembers "who is the current user" for this
//! browsing context. All writes to [`AuthState`] happen here; the rest of
//! the crate reads. Raw tokens pass through on their way to the backend
//! cookie-exchange endpoint but are never cached.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use vikareta_core::{AuthData, AuthState, DomainSet, SessionId, User, ValidationError};

use crate::api::AuthApi;
use crate::host::{CookieJar, KeyValueStore, StorageScope};

/// Storage keys used by the coordinator.
pub mod keys {
    /// Token-free auth snapshot (persistent scope).
    pub const AUTH_STATE: &str = "vikareta_auth_state";
    /// Cached user preferences (persistent scope).
    pub const PREFERENCES: &str = "vikareta_preferences";
    /// Post-login return URL (session scope; deliberately tab-lifetime so
    /// return URLs never leak across long-lived storage).
    pub const RETURN_URL: &str = "vikareta_return_url";
}

/// Cookie names the backend issues; cleared per configured domain on
/// logout.
const AUTH_COOKIES: [&str; 3] = ["access_token", "refresh_token", "XSRF-TOKEN"];

/// Errors that can occur when storing auth data.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Candidate bundle failed the shape check; previous state is
    /// untouched.
    #[error("invalid auth data: {0}")]
    Validation(#[from] ValidationError),
}

/// Token-free snapshot cached in persistent storage across page loads.
/// Whatever it claims is re-validated against the backend on the next
/// initialize round-trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedAuthState {
    user: User,
    session_id: Option<SessionId>,
}

/// Owner of the canonical in-memory [`AuthState`].
pub struct AuthStateStore {
    state: RwLock<AuthState>,
    storage: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn CookieJar>,
    api: Arc<dyn AuthApi>,
    domains: DomainSet,
}

impl AuthStateStore {
    #[must_use]
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        cookies: Arc<dyn CookieJar>,
        api: Arc<dyn AuthApi>,
        domains: DomainSet,
    ) -> Self {
        Self {
            state: RwLock::new(AuthState::loading()),
            storage,
            cookies,
            api,
            domains,
        }
    }

    /// Accept a validated auth bundle.
    ///
    /// The in-memory state and cached snapshot are updated synchronously;
    /// the cookie-exchange call that follows is best-effort: its failure is
    /// logged but never rolls the state back, because whether the user is
    /// *really* logged in is decided by the next validation round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] if the bundle fails the shape
    /// check; the previously-held state is left untouched.
    pub async fn store_auth_data(&self, data: AuthData) -> Result<(), StoreError> {
        data.validate()?;

        let next = AuthState::authenticated(data.user.clone(), data.session_id.clone());
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
        self.cache_snapshot(&data);

        if let Err(error) = self.api.exchange_sso(&data).await {
            tracing::warn!(%error, "cookie exchange failed; keeping local auth state");
        }

        Ok(())
    }

    /// Current auth state. Never fails.
    ///
    /// Falls back to the cached snapshot when memory holds nothing; a
    /// snapshot that fails validation is cleared as a side effect and the
    /// empty state returned.
    #[must_use]
    pub fn get_stored_auth_data(&self) -> AuthState {
        {
            let state = match self.state.read() {
                Ok(state) => state,
                Err(_) => return AuthState::unauthenticated(),
            };
            if state.is_authenticated {
                return state.clone();
            }
            if !state.is_loading {
                return state.clone();
            }
        }

        // First read of this context: hydrate from the cached snapshot.
        match self.load_snapshot() {
            Some(cached) => {
                let state = AuthState::authenticated(cached.user, cached.session_id);
                if let Ok(mut slot) = self.state.write() {
                    *slot = state.clone();
                }
                state
            }
            None => {
                let state = AuthState::unauthenticated();
                if let Ok(mut slot) = self.state.write() {
                    *slot = state.clone();
                }
                state
            }
        }
    }

    /// Reset to the empty state and scrub every trace of the session:
    /// cached snapshot, preferences, return URL, and auth cookies on every
    /// configured domain.
    pub fn clear_auth_data(&self) {
        if let Ok(mut state) = self.state.write() {
            *state = AuthState::unauthenticated();
        }

        self.storage.remove(StorageScope::Persistent, keys::AUTH_STATE);
        self.storage.remove(StorageScope::Persistent, keys::PREFERENCES);
        self.storage.remove(StorageScope::Session, keys::RETURN_URL);

        for host in [
            self.domains.main.as_str(),
            self.domains.dashboard.as_str(),
            self.domains.admin.as_str(),
        ] {
            for cookie in AUTH_COOKIES {
                self.cookies.clear(cookie, host);
            }
        }
    }

    /// Replace the in-memory state without touching storage. Reserved for
    /// the SSO client's init/login/refresh outcome transitions.
    pub(crate) fn set_state(&self, next: AuthState) {
        if let Ok(mut state) = self.state.write() {
            *state = next;
        }
    }

    fn cache_snapshot(&self, data: &AuthData) {
        let snapshot = CachedAuthState {
            user: data.user.clone(),
            session_id: data.session_id.clone(),
        };
        match serde_json::to_string(&snapshot) {
            Ok(json) => self
                .storage
                .set(StorageScope::Persistent, keys::AUTH_STATE, &json),
            Err(error) => tracing::warn!(%error, "failed to serialize auth snapshot"),
        }
    }

    fn load_snapshot(&self) -> Option<CachedAuthState> {
        let raw = self.storage.get(StorageScope::Persistent, keys::AUTH_STATE)?;
        let cached: CachedAuthState = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(error) => {
                tracing::warn!(%error, "dropping malformed auth snapshot");
                self.storage.remove(StorageScope::Persistent, keys::AUTH_STATE);
                return None;
            }
        };
        if cached.user.validate().is_err() {
            tracing::warn!("dropping auth snapshot with invalid user shape");
            self.storage.remove(StorageScope::Persistent, keys::AUTH_STATE);
            return None;
        }
        Some(cached)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::StubAuthApi;
    use crate::host::memory::{MemoryCookieJar, MemoryKeyValueStore};
    use vikareta_core::{AuthTokens, SiteDomain, UserRole};

    fn domains() -> DomainSet {
        DomainSet {
            main: "vikareta.com".to_owned(),
            dashboard: "dashboard.vikareta.com".to_owned(),
            admin: "admin.vikareta.com".to_owned(),
        }
    }

    struct Fixture {
        store: AuthStateStore,
        storage: Arc<MemoryKeyValueStore>,
        cookies: Arc<MemoryCookieJar>,
    }

    fn fixture() -> Fixture {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        let api = Arc::new(StubAuthApi::new());
        let store = AuthStateStore::new(
            storage.clone(),
            cookies.clone(),
            api,
            domains(),
        );
        Fixture {
            store,
            storage,
            cookies,
        }
    }

    fn auth_data(user_id: &str) -> AuthData {
        AuthData {
            user: User::new(user_id, UserRole::Buyer).unwrap(),
            tokens: AuthTokens::new("a", "r", None).unwrap(),
            session_id: SessionId::parse("s1").ok(),
            domain: SiteDomain::Main,
        }
    }

    #[tokio::test]
    async fn test_store_then_get() {
        let fx = fixture();
        fx.store.store_auth_data(auth_data("u1")).await.unwrap();

        let state = fx.store.get_stored_auth_data();
        assert!(state.is_authenticated);
        assert_eq!(state.user.unwrap().id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_invalid_bundle_keeps_previous_state() {
        let fx = fixture();
        fx.store.store_auth_data(auth_data("u1")).await.unwrap();

        let mut bad = auth_data("u2");
        bad.tokens = AuthTokens {
            access_token: "".into(),
            refresh_token: "r".into(),
            expires_at: None,
        };
        assert!(fx.store.store_auth_data(bad).await.is_err());

        // Previous state untouched.
        let state = fx.store.get_stored_auth_data();
        assert_eq!(state.user.unwrap().id.as_str(), "u1");
    }

    #[tokio::test]
    async fn test_snapshot_is_token_free() {
        let fx = fixture();
        fx.store.store_auth_data(auth_data("u1")).await.unwrap();

        let raw = fx
            .storage
            .get(StorageScope::Persistent, keys::AUTH_STATE)
            .unwrap();
        assert!(!raw.contains("\"a\""));
        assert!(!raw.contains("accessToken"));
    }

    #[tokio::test]
    async fn test_malformed_snapshot_cleared_on_read() {
        let fx = fixture();
        fx.storage
            .set(StorageScope::Persistent, keys::AUTH_STATE, "{not json");

        let state = fx.store.get_stored_auth_data();
        assert!(!state.is_authenticated);
        assert_eq!(
            fx.storage.get(StorageScope::Persistent, keys::AUTH_STATE),
            None
        );
    }

    #[tokio::test]
    async fn test_clear_scrubs_storage_and_cookies() {
        let fx = fixture();
        fx.store.store_auth_data(auth_data("u1")).await.unwrap();
        fx.store.clear_auth_data();

        let state = fx.store.get_stored_auth_data();
        assert!(!state.is_authenticated);
        assert_eq!(
            fx.storage.get(StorageScope::Persistent, keys::AUTH_STATE),
            None
        );

        // Every configured domain received cookie clears.
        let cleared = fx.cookies.cleared();
        for host in ["vikareta.com", "dashboard.vikareta.com", "admin.vikareta.com"] {
            assert!(cleared.iter().any(|(_, domain)| domain == host));
        }
    }

    #[tokio::test]
    async fn test_exchange_failure_does_not_roll_back() {
        let storage = Arc::new(MemoryKeyValueStore::new());
        let cookies = Arc::new(MemoryCookieJar::new());
        let api = StubAuthApi::new();
        api.fail_transport(crate::api::Endpoint::ExchangeSso);
        let store = AuthStateStore::new(
            storage,
            cookies,
            Arc::new(api),
            domains(),
        );

        store.store_auth_data(auth_data("u1")).await.unwrap();
        assert!(store.get_stored_auth_data().is_authenticated);
    }
}
