//! Vikareta Session - cross-domain session coordinator.
//!
//! This crate coordinates authentication state across the cooperating
//! Vikareta sites (main storefront, dashboard, admin), which cannot read
//! each other's cookies. It owns the canonical [`AuthState`] for one
//! browsing context, orchestrates login/logout/refresh/initialize against
//! the platform REST API, propagates sessions to sibling domains through a
//! token-exchange handshake plus fire-and-forget beacons, and enforces
//! client-side idle expiry with a server heartbeat.
//!
//! # Architecture
//!
//! Every host-environment primitive is a trait seam in [`host`]:
//! cookies, key-value storage, beacon delivery, and navigation. The
//! backend API is a trait seam in [`api`]. The coordination logic is
//! therefore fully testable headlessly; `host::memory` and
//! [`api::StubAuthApi`] provide complete in-process implementations.
//!
//! Construction happens once, through [`SessionCoordinator`]; there are no
//! module-level singletons.
//!
//! [`AuthState`]: vikareta_core::AuthState
//! [`SessionCoordinator`]: coordinator::SessionCoordinator

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod activity;
pub mod api;
pub mod config;
pub mod coordinator;
pub mod host;
pub mod notify;
pub mod sso;
pub mod store;
pub mod sync;

pub use activity::SessionActivityManager;
pub use api::{ApiError, AuthApi, HttpAuthApi, StubAuthApi};
pub use config::{ConfigError, CoordinatorConfig};
pub use coordinator::SessionCoordinator;
pub use host::{BeaconSender, CookieJar, HostEnvironment, KeyValueStore, Navigator, StorageScope};
pub use notify::{BroadcastNotifier, SessionChange, SessionChangeEvent, SessionChangeNotifier};
pub use sso::{LoginCredentials, SsoClient};
pub use store::AuthStateStore;
pub use sync::CrossDomainSync;
