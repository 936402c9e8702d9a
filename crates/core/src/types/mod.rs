//! Core types for the Vikareta session coordinator.
//!
//! This module provides type-safe wrappers for the coordinator's domain
//! concepts: opaque identifiers, the authenticated principal, transient
//! token bundles, the canonical auth state, and site-domain matching.

pub mod auth;
pub mod domain;
pub mod id;
pub mod tokens;
pub mod user;

pub use auth::{AuthData, AuthState, SessionInfo, ValidationError};
pub use domain::{DomainSet, SiteDomain};
pub use id::*;
pub use tokens::AuthTokens;
pub use user::{User, UserRole, VerificationTier};
