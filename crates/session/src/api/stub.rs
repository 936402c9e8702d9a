//! Programmable in-process auth API.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use vikareta_core::{
    AuthData, AuthTokens, SessionId, SiteDomain, User, UserRole,
};

use super::{ApiError, AuthApi, AuthPayload, RefreshPayload};

/// The nine auth API operations, used to key counters, failures, and
/// delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Login,
    Guest,
    LogoutAll,
    Refresh,
    Me,
    ExchangeSso,
    SsoToken,
    ValidateSession,
    Heartbeat,
}

#[derive(Debug, Clone)]
enum Failure {
    Status { status: u16, message: String },
    Transport,
}

#[derive(Default)]
struct StubState {
    accounts: HashMap<String, (String, AuthPayload)>,
    current_user: Option<User>,
    refresh: Option<RefreshPayload>,
    failures: HashMap<Endpoint, Failure>,
    delays: HashMap<Endpoint, Duration>,
    valid_sessions: Vec<SessionId>,
}

/// Programmable stand-in for the platform auth backend.
///
/// Registers accounts, injects failures and latency per endpoint, and
/// counts wire calls, which is what the refresh-dedup property is asserted
/// against. Cheap to clone; all state is shared.
#[derive(Clone, Default)]
pub struct StubAuthApi {
    state: Arc<Mutex<StubState>>,
    counters: Arc<Counters>,
}

#[derive(Default)]
struct Counters {
    login: AtomicUsize,
    guest: AtomicUsize,
    logout_all: AtomicUsize,
    refresh: AtomicUsize,
    me: AtomicUsize,
    exchange_sso: AtomicUsize,
    sso_token: AtomicUsize,
    validate_session: AtomicUsize,
    heartbeat: AtomicUsize,
}

impl Counters {
    fn slot(&self, endpoint: Endpoint) -> &AtomicUsize {
        match endpoint {
            Endpoint::Login => &self.login,
            Endpoint::Guest => &self.guest,
            Endpoint::LogoutAll => &self.logout_all,
            Endpoint::Refresh => &self.refresh,
            Endpoint::Me => &self.me,
            Endpoint::ExchangeSso => &self.exchange_sso,
            Endpoint::SsoToken => &self.sso_token,
            Endpoint::ValidateSession => &self.validate_session,
            Endpoint::Heartbeat => &self.heartbeat,
        }
    }
}

impl StubAuthApi {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account that `login` will accept.
    pub fn register_account(&self, email: &str, password: &str, payload: AuthPayload) {
        if let Ok(mut state) = self.state.lock() {
            state
                .accounts
                .insert(email.to_owned(), (password.to_owned(), payload));
        }
    }

    /// Fix the payload the next refresh calls return.
    pub fn set_refresh(&self, payload: RefreshPayload) {
        if let Ok(mut state) = self.state.lock() {
            state.refresh = Some(payload);
        }
    }

    /// Fix the user `/me` reports (login and refresh also update it).
    pub fn set_current_user(&self, user: User) {
        if let Ok(mut state) = self.state.lock() {
            state.current_user = Some(user);
        }
    }

    /// Mark a session id as valid for `validate_session`.
    pub fn add_valid_session(&self, session_id: SessionId) {
        if let Ok(mut state) = self.state.lock() {
            state.valid_sessions.push(session_id);
        }
    }

    /// Make an endpoint return a non-2xx failure.
    pub fn fail_with(&self, endpoint: Endpoint, status: u16, message: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(
                endpoint,
                Failure::Status {
                    status,
                    message: message.to_owned(),
                },
            );
        }
    }

    /// Make an endpoint fail at the transport layer.
    pub fn fail_transport(&self, endpoint: Endpoint) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.insert(endpoint, Failure::Transport);
        }
    }

    /// Stop failing an endpoint.
    pub fn recover(&self, endpoint: Endpoint) {
        if let Ok(mut state) = self.state.lock() {
            state.failures.remove(&endpoint);
        }
    }

    /// Add latency before an endpoint responds.
    pub fn set_delay(&self, endpoint: Endpoint, delay: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.delays.insert(endpoint, delay);
        }
    }

    /// Number of wire calls made to an endpoint.
    #[must_use]
    pub fn calls(&self, endpoint: Endpoint) -> usize {
        self.counters.slot(endpoint).load(Ordering::SeqCst)
    }

    /// A ready-made payload for a registered or ad-hoc user.
    #[must_use]
    pub fn payload_for(user: User) -> AuthPayload {
        #[allow(clippy::unwrap_used)]
        let tokens = AuthTokens::new("stub-access", "stub-refresh", None).unwrap();
        AuthPayload {
            user,
            tokens,
            session_id: SessionId::parse(&Uuid::new_v4().to_string()).ok(),
        }
    }

    async fn enter(&self, endpoint: Endpoint) -> Result<(), ApiError> {
        self.counters.slot(endpoint).fetch_add(1, Ordering::SeqCst);

        let (delay, failure) = {
            let state = self
                .state
                .lock()
                .map_err(|_| ApiError::Transport("stub poisoned".to_owned()))?;
            (
                state.delays.get(&endpoint).copied(),
                state.failures.get(&endpoint).cloned(),
            )
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match failure {
            None => Ok(()),
            Some(Failure::Status { status, message }) => Err(ApiError::Status { status, message }),
            Some(Failure::Transport) => {
                Err(ApiError::Transport("connection refused".to_owned()))
            }
        }
    }
}

#[async_trait]
impl AuthApi for StubAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        self.enter(Endpoint::Login).await?;

        let payload = {
            let state = self
                .state
                .lock()
                .map_err(|_| ApiError::Transport("stub poisoned".to_owned()))?;
            match state.accounts.get(email) {
                Some((expected, payload)) if expected == password => Some(payload.clone()),
                _ => None,
            }
        };

        match payload {
            Some(payload) => {
                self.set_current_user(payload.user.clone());
                Ok(payload)
            }
            None => Err(ApiError::Status {
                status: 401,
                message: "Invalid credentials".to_owned(),
            }),
        }
    }

    async fn guest_session(&self) -> Result<AuthPayload, ApiError> {
        self.enter(Endpoint::Guest).await?;

        let guest = User::new(&format!("guest-{}", Uuid::new_v4()), UserRole::Guest)
            .map_err(|_| ApiError::InvalidResponse)?;
        let payload = Self::payload_for(guest);
        self.set_current_user(payload.user.clone());
        Ok(payload)
    }

    async fn logout_all(&self) -> Result<(), ApiError> {
        self.enter(Endpoint::LogoutAll).await?;
        if let Ok(mut state) = self.state.lock() {
            state.current_user = None;
        }
        Ok(())
    }

    async fn refresh(&self) -> Result<RefreshPayload, ApiError> {
        self.enter(Endpoint::Refresh).await?;

        let payload = {
            let state = self
                .state
                .lock()
                .map_err(|_| ApiError::Transport("stub poisoned".to_owned()))?;
            state.refresh.clone().or_else(|| {
                state.current_user.clone().map(|user| RefreshPayload {
                    user,
                    access_token: None,
                    refresh_token: None,
                    session_id: None,
                })
            })
        };

        payload.ok_or(ApiError::Status {
            status: 401,
            message: "Session expired".to_owned(),
        })
    }

    async fn me(&self) -> Result<User, ApiError> {
        self.enter(Endpoint::Me).await?;

        let user = self
            .state
            .lock()
            .map_err(|_| ApiError::Transport("stub poisoned".to_owned()))?
            .current_user
            .clone();

        user.ok_or(ApiError::Status {
            status: 401,
            message: "Unauthorized".to_owned(),
        })
    }

    async fn exchange_sso(&self, _data: &AuthData) -> Result<(), ApiError> {
        self.enter(Endpoint::ExchangeSso).await
    }

    async fn sso_token(&self, target: SiteDomain) -> Result<String, ApiError> {
        self.enter(Endpoint::SsoToken).await?;
        Ok(format!("sso-{target}-{}", Uuid::new_v4()))
    }

    async fn validate_session(&self, session_id: &SessionId) -> Result<bool, ApiError> {
        self.enter(Endpoint::ValidateSession).await?;
        let state = self
            .state
            .lock()
            .map_err(|_| ApiError::Transport("stub poisoned".to_owned()))?;
        Ok(state.valid_sessions.contains(session_id))
    }

    async fn heartbeat(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let _ = session_id;
        self.enter(Endpoint::Heartbeat).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_login_accepts_registered_account() {
        let api = StubAuthApi::new();
        let user = User::new("u1", UserRole::Buyer).unwrap();
        api.register_account("a@b.c", "pw", StubAuthApi::payload_for(user));

        let payload = api.login("a@b.c", "pw").await.unwrap();
        assert_eq!(payload.user.id.as_str(), "u1");
        assert_eq!(api.calls(Endpoint::Login), 1);
    }

    #[tokio::test]
    async fn test_login_rejects_wrong_password() {
        let api = StubAuthApi::new();
        let user = User::new("u1", UserRole::Buyer).unwrap();
        api.register_account("a@b.c", "pw", StubAuthApi::payload_for(user));

        let err = api.login("a@b.c", "nope").await.unwrap_err();
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let api = StubAuthApi::new();
        api.fail_transport(Endpoint::LogoutAll);
        assert!(api.logout_all().await.is_err());

        api.recover(Endpoint::LogoutAll);
        assert!(api.logout_all().await.is_ok());
    }
}
