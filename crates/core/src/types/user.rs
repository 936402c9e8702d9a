//! The authenticated principal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::auth::ValidationError;
use crate::types::domain::SiteDomain;
use crate::types::id::UserId;

/// Role of a marketplace principal.
///
/// Maps to the backend's `userType` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    /// Purchases products and services.
    #[default]
    Buyer,
    /// Lists products and services.
    Seller,
    /// Both buyer and seller.
    Both,
    /// Platform administrator.
    Admin,
    /// Platform super administrator.
    SuperAdmin,
    /// Anonymous browsing session with a server-side record.
    Guest,
}

/// Business verification tier of a principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationTier {
    #[default]
    Unverified,
    Basic,
    Verified,
    Premium,
}

/// An authenticated principal as returned by the backend.
///
/// The coordinator only enforces the shape it depends on (a non-empty id,
/// email-as-string when present); deep validation is the backend's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Opaque identifier issued by the backend.
    pub id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    /// Role of the principal, named `userType` on the wire.
    #[serde(rename = "userType", default)]
    pub role: UserRole,
    #[serde(default)]
    pub verification_tier: VerificationTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Tax identifier (GSTIN for Indian businesses).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gstin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Create a minimal user with just an id and role.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyUserId`] if the id is empty.
    pub fn new(id: &str, role: UserRole) -> Result<Self, ValidationError> {
        let id = UserId::parse(id).map_err(|_| ValidationError::EmptyUserId)?;
        Ok(Self {
            id,
            email: None,
            first_name: None,
            last_name: None,
            business_name: None,
            role,
            verification_tier: VerificationTier::default(),
            phone: None,
            gstin: None,
            created_at: None,
        })
    }

    /// Check the shape the coordinator depends on.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyUserId`] if the id is empty. Email,
    /// when present, is already a string by construction; no further checks
    /// are the coordinator's responsibility.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.id.as_str().is_empty() {
            return Err(ValidationError::EmptyUserId);
        }
        Ok(())
    }

    /// Whether this principal may access the given site surface.
    ///
    /// Guests hold a server-correlated session but are never allowed past
    /// the public storefront. Admin surfaces require an admin role.
    #[must_use]
    pub const fn can_access(&self, surface: SiteDomain) -> bool {
        match surface {
            SiteDomain::Main => true,
            SiteDomain::Dashboard => !matches!(self.role, UserRole::Guest),
            SiteDomain::Admin => matches!(self.role, UserRole::Admin | UserRole::SuperAdmin),
        }
    }

    /// Whether this principal is a guest session.
    #[must_use]
    pub const fn is_guest(&self) -> bool {
        matches!(self.role, UserRole::Guest)
    }
}
