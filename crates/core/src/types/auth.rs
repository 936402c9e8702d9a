//! Canonical authentication state and the bundles that feed it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::domain::SiteDomain;
use crate::types::id::{SessionId, UserId};
use crate::types::tokens::AuthTokens;
use crate::types::user::User;

/// Shape violations the coordinator rejects before trusting a payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// User identifier is missing or empty.
    #[error("user id cannot be empty")]
    EmptyUserId,

    /// Access or refresh token is empty.
    #[error("auth tokens cannot be empty")]
    EmptyTokens,
}

/// Candidate authentication bundle, validated before the store accepts it.
#[derive(Debug, Clone)]
pub struct AuthData {
    pub user: User,
    pub tokens: AuthTokens,
    pub session_id: Option<SessionId>,
    /// Site the bundle was issued for.
    pub domain: SiteDomain,
}

impl AuthData {
    /// Check the full bundle shape: user, tokens, domain.
    ///
    /// # Errors
    ///
    /// Returns the first shape violation found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.user.validate()?;
        self.tokens.validate()?;
        Ok(())
    }
}

/// The single source of truth surfaced to the application.
///
/// Invariant: `is_authenticated` is true if and only if `user` is present
/// and passed the shape check. The constructors below are the only intended
/// way to build one, which keeps the invariant by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub is_authenticated: bool,
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
}

impl AuthState {
    /// State at process start, before the first initialization round-trip.
    #[must_use]
    pub const fn loading() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: true,
            error: None,
            session_id: None,
        }
    }

    /// Empty, settled state with no principal.
    #[must_use]
    pub const fn unauthenticated() -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
            error: None,
            session_id: None,
        }
    }

    /// Settled state for a validated principal.
    #[must_use]
    pub const fn authenticated(user: User, session_id: Option<SessionId>) -> Self {
        Self {
            user: Some(user),
            is_authenticated: true,
            is_loading: false,
            error: None,
            session_id,
        }
    }

    /// Settled failure state; the message is the only surface errors reach
    /// UI consumers through.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            user: None,
            is_authenticated: false,
            is_loading: false,
            error: Some(message.into()),
            session_id: None,
        }
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::unauthenticated()
    }
}

/// Read-mostly projection of the server-correlated session record.
///
/// Authority lives server-side; the client advances `last_activity_at` from
/// throttled interaction events and judges idle expiry independently of
/// server-side expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub user_id: UserId,
    pub domain: SiteDomain,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub last_activity_at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::user::UserRole;

    fn auth_data() -> AuthData {
        AuthData {
            user: User::new("u1", UserRole::Buyer).unwrap(),
            tokens: AuthTokens::new("a", "r", None).unwrap(),
            session_id: SessionId::parse("s1").ok(),
            domain: SiteDomain::Main,
        }
    }

    #[test]
    fn test_valid_bundle() {
        assert!(auth_data().validate().is_ok());
    }

    #[test]
    fn test_authenticated_invariant() {
        let user = User::new("u1", UserRole::Buyer).unwrap();
        let state = AuthState::authenticated(user, None);
        assert!(state.is_authenticated);
        assert!(state.user.is_some());
        assert!(!state.is_loading);
        assert!(state.error.is_none());
    }

    #[test]
    fn test_failed_state_shape() {
        let state = AuthState::failed("Invalid credentials");
        assert!(!state.is_authenticated);
        assert!(state.user.is_none());
        assert_eq!(state.error.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn test_default_is_unauthenticated() {
        let state = AuthState::default();
        assert!(!state.is_authenticated);
        assert!(!state.is_loading);
    }
}
