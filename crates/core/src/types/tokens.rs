//! Transient bearer-token bundle.

use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::types::auth::ValidationError;

/// Fixed token-type tag for all bearer tokens.
pub const TOKEN_TYPE: &str = "Bearer";

/// A bearer access/refresh token pair.
///
/// Tokens are held only long enough to forward them to the backend
/// cookie-exchange endpoint; they are wrapped in [`SecretString`] so they
/// never leak through `Debug` output, and the type deliberately does not
/// implement `Serialize` so they cannot end up in a cached snapshot.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthTokens {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthTokens {
    /// Create a token bundle, rejecting empty token strings.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTokens`] if either token is empty.
    pub fn new(
        access_token: &str,
        refresh_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Self, ValidationError> {
        let tokens = Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        };
        tokens.validate()?;
        Ok(tokens)
    }

    /// Check the shape the coordinator depends on.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyTokens`] if either token is empty.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.access_token.expose_secret().is_empty()
            || self.refresh_token.expose_secret().is_empty()
        {
            return Err(ValidationError::EmptyTokens);
        }
        Ok(())
    }

    /// The fixed token-type tag.
    #[must_use]
    pub const fn token_type() -> &'static str {
        TOKEN_TYPE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_empty() {
        assert!(AuthTokens::new("", "r", None).is_err());
        assert!(AuthTokens::new("a", "", None).is_err());
        assert!(AuthTokens::new("a", "r", None).is_ok());
    }

    #[test]
    fn test_debug_redacts() {
        let tokens = AuthTokens::new("top-secret", "also-secret", None).unwrap();
        let rendered = format!("{tokens:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("also-secret"));
    }

    #[test]
    fn test_wire_deserialize() {
        let tokens: AuthTokens =
            serde_json::from_str(r#"{"accessToken": "a1", "refreshToken": "r1"}"#).unwrap();
        assert_eq!(tokens.access_token.expose_secret(), "a1");
        assert!(tokens.expires_at.is_none());
    }
}
