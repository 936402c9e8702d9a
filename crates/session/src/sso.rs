//! SSO client.
//!
//! The only component that transitions [`AuthState`] between
//! loading/authenticated/error. Every operation resolves to a well-formed
//! `AuthState` — network and validation failures are folded into the
//! `error` field, never thrown past this boundary, so consumers can render
//! loading/error states without error handling of their own.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tokio::sync::Mutex;
use uuid::Uuid;

use vikareta_core::{AuthData, AuthState, AuthTokens, User};

use crate::api::AuthApi;
use crate::notify::{SessionChange, SessionChangeEvent, SessionChangeNotifier};
use crate::store::AuthStateStore;
use crate::sync::CrossDomainSync;

/// Login form credentials.
#[derive(Debug, Clone)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

type SharedRefresh = Shared<BoxFuture<'static, AuthState>>;

/// Orchestrates login, logout, refresh, and initialization.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct SsoClient {
    inner: Arc<SsoClientInner>,
}

struct SsoClientInner {
    store: Arc<AuthStateStore>,
    api: Arc<dyn AuthApi>,
    sync: Arc<CrossDomainSync>,
    notifier: Arc<dyn SessionChangeNotifier>,
    /// Id of this browsing context, attached to published change events.
    origin: Uuid,
    /// In-flight refresh shared by all concurrent callers. Exactly one wire
    /// call happens no matter how many callers pile in; parallel refreshes
    /// against a rotating refresh token would invalidate one of them.
    refresh_inflight: Mutex<Option<SharedRefresh>>,
}

impl SsoClient {
    #[must_use]
    pub fn new(
        store: Arc<AuthStateStore>,
        api: Arc<dyn AuthApi>,
        sync: Arc<CrossDomainSync>,
        notifier: Arc<dyn SessionChangeNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(SsoClientInner {
                store,
                api,
                sync,
                notifier,
                origin: Uuid::new_v4(),
                refresh_inflight: Mutex::new(None),
            }),
        }
    }

    /// Id of this browsing context, for filtering change-event echoes.
    #[must_use]
    pub fn origin(&self) -> Uuid {
        self.inner.origin
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Validate whatever the store holds and settle the auth state.
    ///
    /// Cached state claiming to be authenticated is independently
    /// re-validated against `/api/auth/me`; on failure the state is cleared
    /// and reported as "Session expired". Idempotent and safe to re-run at
    /// any time — cross-context notifications may race a context's own
    /// boot-time call.
    pub async fn initialize(&self) -> AuthState {
        let cached = self.inner.store.get_stored_auth_data();
        if !cached.is_authenticated {
            return cached;
        }

        match self.inner.api.me().await {
            Ok(user) => {
                let state = AuthState::authenticated(user, cached.session_id);
                self.inner.store.set_state(state.clone());
                state
            }
            Err(error) => {
                tracing::warn!(%error, "cached session failed validation");
                self.inner.store.clear_auth_data();
                let state = AuthState::failed("Session expired");
                self.inner.store.set_state(state.clone());
                state
            }
        }
    }

    /// Confirm that the held session still exists server-side.
    ///
    /// Used when a suspended context resumes: the idle clock is the local
    /// authority, but a session can also be revoked from elsewhere while
    /// the context slept. A definitive "gone" from the backend clears the
    /// state; a transport failure keeps it, leaving the verdict to the
    /// next refresh or initialization.
    pub async fn validate_session(&self) -> AuthState {
        let held = self.inner.store.get_stored_auth_data();
        let Some(session_id) = held.session_id.clone() else {
            return held;
        };

        match self.inner.api.validate_session(&session_id).await {
            Ok(true) => held,
            Ok(false) => {
                tracing::info!(session = %session_id, "session revoked server-side");
                self.inner.store.clear_auth_data();
                let state = AuthState::failed("Session expired");
                self.inner.store.set_state(state.clone());
                state
            }
            Err(error) => {
                tracing::warn!(%error, "session validation unreachable; keeping state");
                held
            }
        }
    }

    /// Adopt a session another context just established.
    ///
    /// The cached snapshot cannot be trusted here: this context may hold
    /// nothing yet, or stale data from before the sibling's login. The
    /// backend is asked directly; until its cookies become visible to this
    /// context the held state is simply kept.
    pub async fn adopt_remote_session(&self) -> AuthState {
        match self.inner.api.me().await {
            Ok(user) => {
                let state = AuthState::authenticated(user, None);
                self.inner.store.set_state(state.clone());
                state
            }
            Err(error) => {
                tracing::debug!(%error, "remote session not visible to this context yet");
                self.inner.store.get_stored_auth_data()
            }
        }
    }

    // =========================================================================
    // Login / Logout
    // =========================================================================

    /// Authenticate with the backend and propagate the session.
    ///
    /// The response is validated against the expected shape before being
    /// trusted; a non-conforming payload fails as "Invalid authentication
    /// response". Cross-domain propagation failures are logged, never
    /// surfaced — the login succeeded locally.
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthState {
        self.inner.store.set_state(AuthState::loading());

        let payload = match self
            .inner
            .api
            .login(&credentials.email, &credentials.password)
            .await
        {
            Ok(payload) => payload,
            Err(error) => {
                let state = AuthState::failed(error.user_message());
                self.inner.store.set_state(state.clone());
                return state;
            }
        };

        let data = match payload.into_auth_data(self.inner.sync.current_domain()) {
            Ok(data) => data,
            Err(error) => {
                tracing::warn!(%error, "login response failed shape validation");
                let state = AuthState::failed("Invalid authentication response");
                self.inner.store.set_state(state.clone());
                return state;
            }
        };

        self.accept_session(data).await
    }

    /// Create a guest session with a server-side record.
    ///
    /// Guests are authenticated for session purposes (heartbeats and idle
    /// expiry apply) but route guards deny them the dashboard and admin
    /// surfaces.
    pub async fn create_guest_session(&self) -> AuthState {
        let payload = match self.inner.api.guest_session().await {
            Ok(payload) => payload,
            Err(error) => {
                let state = AuthState::failed(error.user_message());
                self.inner.store.set_state(state.clone());
                return state;
            }
        };

        match payload.into_auth_data(self.inner.sync.current_domain()) {
            Ok(data) => self.accept_session(data).await,
            Err(error) => {
                tracing::warn!(%error, "guest session response failed shape validation");
                let state = AuthState::failed("Invalid authentication response");
                self.inner.store.set_state(state.clone());
                state
            }
        }
    }

    /// Log out everywhere.
    ///
    /// The local clear is unconditional: a failing logout-all round-trip is
    /// logged, and from the user's point of view the logout still happens.
    pub async fn logout(&self) -> AuthState {
        if let Err(error) = self.inner.api.logout_all().await {
            tracing::warn!(%error, "logout-all request failed; clearing locally anyway");
        }
        self.inner.sync.propagate_logout().await;

        self.inner.store.clear_auth_data();
        self.publish(SessionChangeEvent::LoggedOut);
        AuthState::unauthenticated()
    }

    // =========================================================================
    // Refresh
    // =========================================================================

    /// Refresh the session, deduplicating concurrent callers.
    ///
    /// If a refresh is already in flight every caller awaits the same
    /// future. A refresh that returns a different user id than the one held
    /// is a security anomaly: the state is cleared immediately rather than
    /// silently adopting another identity. Ordinary refresh failures only
    /// report failure; the held state is left for the next validation
    /// round-trip to settle.
    pub async fn refresh_token(&self) -> AuthState {
        let shared = {
            let mut slot = self.inner.refresh_inflight.lock().await;
            if let Some(inflight) = slot.as_ref() {
                inflight.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let fut: SharedRefresh = async move {
                    let state = Self::run_refresh(&inner).await;
                    *inner.refresh_inflight.lock().await = None;
                    state
                }
                .boxed()
                .shared();
                *slot = Some(fut.clone());
                fut
            }
        };

        shared.await
    }

    async fn run_refresh(inner: &Arc<SsoClientInner>) -> AuthState {
        let held = inner.store.get_stored_auth_data();
        let Some(held_user) = held.user else {
            return AuthState::failed("Not authenticated");
        };

        let payload = match inner.api.refresh().await {
            Ok(payload) => payload,
            Err(error) => return AuthState::failed(error.user_message()),
        };

        if payload.user.id != held_user.id {
            tracing::error!(
                held = %held_user.id,
                returned = %payload.user.id,
                "refresh returned a different identity; clearing session"
            );
            inner.store.clear_auth_data();
            let state = AuthState::failed("Session identity mismatch");
            inner.store.set_state(state.clone());
            return state;
        }

        let session_id = payload.session_id.or(held.session_id);

        // Rotated tokens, when present, go back through the cookie
        // exchange like a fresh login.
        if let (Some(access), Some(refresh)) = (&payload.access_token, &payload.refresh_token) {
            if let Ok(tokens) = AuthTokens::new(access, refresh, None) {
                let data = AuthData {
                    user: payload.user.clone(),
                    tokens,
                    session_id: session_id.clone(),
                    domain: inner.sync.current_domain(),
                };
                if let Err(error) = inner.store.store_auth_data(data).await {
                    tracing::warn!(%error, "failed to store rotated tokens");
                }
                return inner.store.get_stored_auth_data();
            }
        }

        let state = AuthState::authenticated(payload.user, session_id);
        inner.store.set_state(state.clone());
        state
    }

    // =========================================================================
    // Projections
    // =========================================================================

    /// Current user, if authenticated.
    #[must_use]
    pub fn get_current_user(&self) -> Option<User> {
        self.inner.store.get_stored_auth_data().user
    }

    /// Whether a validated principal is present.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.store.get_stored_auth_data().is_authenticated
    }

    // =========================================================================
    // Internals
    // =========================================================================

    async fn accept_session(&self, data: AuthData) -> AuthState {
        let user_id = data.user.id.clone();

        if let Err(error) = self.inner.store.store_auth_data(data).await {
            let state = AuthState::failed(error.to_string());
            self.inner.store.set_state(state.clone());
            return state;
        }

        // Propagation is all-settle and never fails the login.
        self.inner.sync.sync_sso_across_domains().await;
        self.publish(SessionChangeEvent::LoggedIn { user_id });

        self.inner.store.get_stored_auth_data()
    }

    fn publish(&self, event: SessionChangeEvent) {
        self.inner.notifier.publish(SessionChange {
            origin: self.inner.origin,
            event,
        });
    }
}
