//! Top-level coordinator context.
//!
//! [`SessionCoordinator`] is the one construction point for the whole
//! stack: store, API client, cross-domain sync, SSO client, and activity
//! manager, all sharing the same host seams and change notifier. Embedders
//! build exactly one per browsing context and clone it freely.

use std::sync::Arc;

use tokio::sync::broadcast;

use vikareta_core::{AuthState, SiteDomain, User};

use crate::activity::SessionActivityManager;
use crate::api::{AuthApi, HttpAuthApi};
use crate::config::CoordinatorConfig;
use crate::host::HostEnvironment;
use crate::notify::SessionChange;
use crate::sso::{LoginCredentials, SsoClient};
use crate::store::AuthStateStore;
use crate::sync::CrossDomainSync;

/// One browsing context's session coordinator.
///
/// Cheap to clone; all state lives behind `Arc`s.
#[derive(Clone)]
pub struct SessionCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: CoordinatorConfig,
    host: HostEnvironment,
    store: Arc<AuthStateStore>,
    sync: Arc<CrossDomainSync>,
    sso: SsoClient,
    activity: Arc<SessionActivityManager>,
}

impl SessionCoordinator {
    /// Build a coordinator backed by the real HTTP auth API.
    #[must_use]
    pub fn new(config: CoordinatorConfig, host: HostEnvironment) -> Self {
        let api = Arc::new(HttpAuthApi::new(&config, Arc::clone(&host.cookies)));
        Self::with_api(config, host, api)
    }

    /// Build a coordinator over an explicit [`AuthApi`] implementation.
    #[must_use]
    pub fn with_api(
        config: CoordinatorConfig,
        host: HostEnvironment,
        api: Arc<dyn AuthApi>,
    ) -> Self {
        let store = Arc::new(AuthStateStore::new(
            Arc::clone(&host.storage),
            Arc::clone(&host.cookies),
            Arc::clone(&api),
            config.domains.clone(),
        ));
        let sync = Arc::new(CrossDomainSync::new(
            config.clone(),
            Arc::clone(&api),
            Arc::clone(&host.beacons),
            Arc::clone(&host.navigator),
            Arc::clone(&host.storage),
        ));
        let sso = SsoClient::new(
            Arc::clone(&store),
            Arc::clone(&api),
            Arc::clone(&sync),
            Arc::clone(&host.notifier),
        );
        let activity = Arc::new(SessionActivityManager::new(
            Arc::clone(&store),
            api,
            Arc::clone(&host.navigator),
            Arc::clone(&host.notifier),
            sso.origin(),
            config.idle_timeout,
            config.heartbeat_interval,
            config.activity_throttle,
        ));

        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                host,
                store,
                sync,
                sso,
                activity,
            }),
        }
    }

    // =========================================================================
    // Components
    // =========================================================================

    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn store(&self) -> &AuthStateStore {
        &self.inner.store
    }

    #[must_use]
    pub fn sso(&self) -> &SsoClient {
        &self.inner.sso
    }

    #[must_use]
    pub fn sync(&self) -> &CrossDomainSync {
        &self.inner.sync
    }

    #[must_use]
    pub fn activity(&self) -> &SessionActivityManager {
        &self.inner.activity
    }

    /// Site the current context belongs to.
    #[must_use]
    pub fn current_domain(&self) -> SiteDomain {
        self.inner.config.current_domain
    }

    /// Subscribe to session change events published by any coordinator
    /// sharing this context's notifier. Events carry the origin context id;
    /// compare against [`origin`](Self::origin) to skip echoes.
    #[must_use]
    pub fn changes(&self) -> broadcast::Receiver<SessionChange> {
        self.inner.host.notifier.subscribe()
    }

    /// Id of this context, for filtering change-event echoes.
    #[must_use]
    pub fn origin(&self) -> uuid::Uuid {
        self.inner.sso.origin()
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    /// Settle the auth state at context boot and, if a session is live,
    /// begin activity tracking for it.
    pub async fn initialize(&self) -> AuthState {
        let state = self.inner.sso.initialize().await;
        self.track_if_live(&state);
        state
    }

    /// Authenticate and begin tracking the new session.
    pub async fn login(&self, credentials: &LoginCredentials) -> AuthState {
        let state = self.inner.sso.login(credentials).await;
        self.track_if_live(&state);
        state
    }

    /// Create an anonymous guest session and begin tracking it.
    pub async fn create_guest_session(&self) -> AuthState {
        let state = self.inner.sso.create_guest_session().await;
        self.track_if_live(&state);
        state
    }

    /// Log out everywhere and stop tracking.
    pub async fn logout(&self) -> AuthState {
        self.inner.activity.stop_session();
        self.inner.sso.logout().await
    }

    /// Refresh the session, deduplicated with any refresh already in
    /// flight.
    pub async fn refresh_token(&self) -> AuthState {
        let state = self.inner.sso.refresh_token().await;
        // A refresh can rotate the session id or kill the session outright.
        if state.is_authenticated {
            self.track_if_live(&state);
        } else {
            self.inner.activity.stop_session();
        }
        state
    }

    /// Re-check the session when the host context resumes (on the web, the
    /// tab becoming visible again). The idle watchdog handles expiry on its
    /// own; this catches sessions revoked elsewhere while the context
    /// slept.
    pub async fn on_resume(&self) -> AuthState {
        if self.inner.activity.is_session_expired() {
            return self.inner.store.get_stored_auth_data();
        }
        let state = self.inner.sso.validate_session().await;
        if !state.is_authenticated {
            self.inner.activity.stop_session();
        }
        state
    }

    /// Apply a change event published by a sibling context. Echoes from
    /// this context are ignored.
    pub async fn handle_remote_change(&self, change: &SessionChange) -> AuthState {
        if change.origin == self.origin() {
            return self.inner.store.get_stored_auth_data();
        }
        match change.event {
            crate::notify::SessionChangeEvent::LoggedIn { .. } => {
                self.inner.sso.adopt_remote_session().await
            }
            crate::notify::SessionChangeEvent::LoggedOut
            | crate::notify::SessionChangeEvent::TimedOut => {
                self.inner.activity.stop_session();
                self.inner.store.clear_auth_data();
                self.inner.store.get_stored_auth_data()
            }
        }
    }

    // =========================================================================
    // Convenience
    // =========================================================================

    #[must_use]
    pub fn get_current_user(&self) -> Option<User> {
        self.inner.sso.get_current_user()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.sso.is_authenticated()
    }

    /// Record user activity on the tracked session.
    pub fn record_activity(&self) {
        self.inner.activity.record_activity();
    }

    fn track_if_live(&self, state: &AuthState) {
        if !state.is_authenticated {
            return;
        }
        let Some(session_id) = state.session_id.clone() else {
            return;
        };
        if self.inner.activity.current_session_id().as_ref() != Some(&session_id) {
            self.inner.activity.start_session(session_id);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::StubAuthApi;
    use crate::host::memory::{
        MemoryBeaconSender, MemoryCookieJar, MemoryKeyValueStore, MemoryNavigator,
    };
    use crate::notify::{BroadcastNotifier, SessionChangeEvent};
    use vikareta_core::{DomainSet, UserRole};

    fn domains() -> DomainSet {
        DomainSet {
            main: "vikareta.com".to_owned(),
            dashboard: "dashboard.vikareta.com".to_owned(),
            admin: "admin.vikareta.com".to_owned(),
        }
    }

    fn coordinator_with(api: &StubAuthApi) -> SessionCoordinator {
        let config =
            CoordinatorConfig::new("https://api.vikareta.com", domains(), "vikareta.com").unwrap();
        let host = HostEnvironment {
            cookies: Arc::new(MemoryCookieJar::new()),
            storage: Arc::new(MemoryKeyValueStore::new()),
            beacons: Arc::new(MemoryBeaconSender::new()),
            navigator: Arc::new(MemoryNavigator::new()),
            notifier: Arc::new(BroadcastNotifier::new()),
        };
        SessionCoordinator::with_api(config, host, Arc::new(api.clone()))
    }

    fn buyer() -> User {
        User::new("u1", UserRole::Buyer).unwrap()
    }

    #[tokio::test]
    async fn test_login_starts_activity_tracking() {
        let api = StubAuthApi::new();
        api.register_account("a@b.com", "pw", StubAuthApi::payload_for(buyer()));
        let coordinator = coordinator_with(&api);

        let state = coordinator
            .login(&LoginCredentials {
                email: "a@b.com".to_owned(),
                password: "pw".to_owned(),
            })
            .await;

        assert!(state.is_authenticated);
        assert_eq!(
            coordinator.activity().current_session_id(),
            state.session_id
        );
    }

    #[tokio::test]
    async fn test_logout_stops_activity_tracking() {
        let api = StubAuthApi::new();
        api.register_account("a@b.com", "pw", StubAuthApi::payload_for(buyer()));
        let coordinator = coordinator_with(&api);

        coordinator
            .login(&LoginCredentials {
                email: "a@b.com".to_owned(),
                password: "pw".to_owned(),
            })
            .await;
        let state = coordinator.logout().await;

        assert!(!state.is_authenticated);
        assert_eq!(coordinator.activity().current_session_id(), None);
        assert!(coordinator.get_current_user().is_none());
    }

    #[tokio::test]
    async fn test_remote_logout_clears_local_state() {
        let api = StubAuthApi::new();
        api.register_account("a@b.com", "pw", StubAuthApi::payload_for(buyer()));
        let coordinator = coordinator_with(&api);

        coordinator
            .login(&LoginCredentials {
                email: "a@b.com".to_owned(),
                password: "pw".to_owned(),
            })
            .await;

        let remote = SessionChange {
            origin: uuid::Uuid::new_v4(),
            event: SessionChangeEvent::LoggedOut,
        };
        let state = coordinator.handle_remote_change(&remote).await;

        assert!(!state.is_authenticated);
        assert!(!coordinator.is_authenticated());
    }

    #[tokio::test]
    async fn test_resume_with_revoked_session_stops_tracking() {
        let api = StubAuthApi::new();
        api.register_account("a@b.com", "pw", StubAuthApi::payload_for(buyer()));
        let coordinator = coordinator_with(&api);

        coordinator
            .login(&LoginCredentials {
                email: "a@b.com".to_owned(),
                password: "pw".to_owned(),
            })
            .await;

        // The backend never learned this session id, so resume finds it
        // revoked.
        let state = coordinator.on_resume().await;

        assert!(!state.is_authenticated);
        assert_eq!(coordinator.activity().current_session_id(), None);
    }

    #[tokio::test]
    async fn test_own_echo_is_ignored() {
        let api = StubAuthApi::new();
        api.register_account("a@b.com", "pw", StubAuthApi::payload_for(buyer()));
        let coordinator = coordinator_with(&api);

        coordinator
            .login(&LoginCredentials {
                email: "a@b.com".to_owned(),
                password: "pw".to_owned(),
            })
            .await;

        let echo = SessionChange {
            origin: coordinator.origin(),
            event: SessionChangeEvent::LoggedOut,
        };
        let state = coordinator.handle_remote_change(&echo).await;

        assert!(state.is_authenticated);
        assert!(coordinator.is_authenticated());
    }
}
