//! Platform auth API client.
//!
//! [`AuthApi`] is the coordinator's contract with the backend; the exact
//! server implementation is out of scope and reached only through these
//! nine operations. [`HttpAuthApi`] implements the contract over HTTP;
//! [`StubAuthApi`] is a programmable in-process implementation for tests
//! and headless embedding.

mod http;
mod stub;

pub use http::HttpAuthApi;
pub use stub::{Endpoint, StubAuthApi};

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use vikareta_core::{
    AuthData, AuthTokens, SessionId, SiteDomain, User, ValidationError,
};

/// Errors that can occur when calling the auth API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP transport failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport failed below the HTTP layer.
    #[error("transport error: {0}")]
    Transport(String),

    /// API returned a non-2xx response.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Response body did not conform to the expected shape.
    #[error("invalid authentication response")]
    InvalidResponse,
}

impl ApiError {
    /// The message surfaced to UI consumers through `AuthState.error`.
    ///
    /// Server-provided messages pass through verbatim ("Invalid
    /// credentials"); transport failures collapse to a generic message so
    /// internals are not exposed.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Http(_) | Self::Transport(_) => "Network error".to_owned(),
            Self::Status { message, .. } => message.clone(),
            Self::InvalidResponse => "Invalid authentication response".to_owned(),
        }
    }
}

/// Full authentication payload, as returned by login and guest-session.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthPayload {
    pub user: User,
    #[serde(flatten)]
    pub tokens: AuthTokens,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

impl AuthPayload {
    /// Convert into a store-ready bundle for the given site.
    ///
    /// # Errors
    ///
    /// Returns the first shape violation found.
    pub fn into_auth_data(self, domain: SiteDomain) -> Result<AuthData, ValidationError> {
        let data = AuthData {
            user: self.user,
            tokens: self.tokens,
            session_id: self.session_id,
            domain,
        };
        data.validate()?;
        Ok(data)
    }
}

/// Refresh payload. Token fields are optional: the backend may rotate
/// cookies server-side and return only the user.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshPayload {
    pub user: User,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub session_id: Option<SessionId>,
}

/// The coordinator's contract with the platform auth backend.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// `POST /api/auth/login`.
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError>;

    /// `POST /api/auth/guest`.
    async fn guest_session(&self) -> Result<AuthPayload, ApiError>;

    /// `POST /api/auth/logout-all`. Best-effort from the caller's side.
    async fn logout_all(&self) -> Result<(), ApiError>;

    /// `POST /api/auth/refresh`.
    async fn refresh(&self) -> Result<RefreshPayload, ApiError>;

    /// `GET /api/auth/me`. Used purely for validation, never stored
    /// directly.
    async fn me(&self) -> Result<User, ApiError>;

    /// `POST /api/auth/exchange-sso`. Hands tokens to the backend so it can
    /// mint HttpOnly cookies; the response body is ignored.
    async fn exchange_sso(&self, data: &AuthData) -> Result<(), ApiError>;

    /// `POST /api/auth/sso-token`. Returns a short-lived signed token
    /// scoped to the target site.
    async fn sso_token(&self, target: SiteDomain) -> Result<String, ApiError>;

    /// `POST /api/auth/session`. Boolean validity check.
    async fn validate_session(&self, session_id: &SessionId) -> Result<bool, ApiError>;

    /// `POST /api/auth/heartbeat`. Keep-alive; response ignored.
    async fn heartbeat(&self, session_id: &SessionId) -> Result<(), ApiError>;
}
