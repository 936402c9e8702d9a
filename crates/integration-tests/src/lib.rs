//! Integration tests for the Vikareta session coordinator.
//!
//! Each test drives one or more [`SessionCoordinator`]s end to end against
//! the in-process stub backend and in-memory host seams. Sibling contexts
//! built from the same [`TestContext`] share the backend and the change
//! notifier but keep their own storage, cookies, beacons, and navigator,
//! modeling separate browsing contexts on cooperating sites.
//!
//! # Test Categories
//!
//! - `login_flow` - login, propagation, and post-login redirects
//! - `session_lifecycle` - idle expiry, heartbeats, and refresh storms
//! - `cross_context` - change events between sibling contexts

use std::sync::Arc;

use vikareta_core::{DomainSet, User, UserRole};
use vikareta_session::api::StubAuthApi;
use vikareta_session::host::memory::{
    MemoryBeaconSender, MemoryCookieJar, MemoryKeyValueStore, MemoryNavigator,
};
use vikareta_session::{
    BeaconSender, BroadcastNotifier, CoordinatorConfig, HostEnvironment, LoginCredentials,
    Navigator, SessionChangeNotifier, SessionCoordinator,
};

pub const MAIN_HOST: &str = "vikareta.com";
pub const DASHBOARD_HOST: &str = "dashboard.vikareta.com";
pub const ADMIN_HOST: &str = "admin.vikareta.com";
pub const API_BASE_URL: &str = "https://api.vikareta.com";

#[must_use]
pub fn domains() -> DomainSet {
    DomainSet {
        main: MAIN_HOST.to_owned(),
        dashboard: DASHBOARD_HOST.to_owned(),
        admin: ADMIN_HOST.to_owned(),
    }
}

/// One browsing context wired to the shared stub backend.
pub struct TestContext {
    pub api: StubAuthApi,
    pub notifier: Arc<BroadcastNotifier>,
    pub beacons: Arc<MemoryBeaconSender>,
    pub navigator: Arc<MemoryNavigator>,
    pub coordinator: SessionCoordinator,
}

impl TestContext {
    /// Fresh backend and change channel, context on the given host.
    #[must_use]
    pub fn on_host(host: &str) -> Self {
        Self::build(StubAuthApi::new(), Arc::new(BroadcastNotifier::new()), host)
    }

    /// Sibling context on another host: same backend, same change channel,
    /// everything else isolated.
    #[must_use]
    pub fn sibling(&self, host: &str) -> Self {
        Self::build(self.api.clone(), Arc::clone(&self.notifier), host)
    }

    fn build(api: StubAuthApi, notifier: Arc<BroadcastNotifier>, host: &str) -> Self {
        init_tracing();

        #[allow(clippy::unwrap_used)]
        let config = CoordinatorConfig::new(API_BASE_URL, domains(), host).unwrap();

        let beacons = Arc::new(MemoryBeaconSender::new());
        let navigator = Arc::new(MemoryNavigator::new());
        let environment = HostEnvironment {
            cookies: Arc::new(MemoryCookieJar::new()),
            storage: Arc::new(MemoryKeyValueStore::new()),
            beacons: Arc::clone(&beacons) as Arc<dyn BeaconSender>,
            navigator: Arc::clone(&navigator) as Arc<dyn Navigator>,
            notifier: Arc::clone(&notifier) as Arc<dyn SessionChangeNotifier>,
        };
        let coordinator = SessionCoordinator::with_api(config, environment, Arc::new(api.clone()));

        Self {
            api,
            notifier,
            beacons,
            navigator,
            coordinator,
        }
    }

    /// Register a buyer account on the backend and return its credentials.
    #[must_use]
    pub fn register_buyer(&self, id: &str) -> LoginCredentials {
        let payload = StubAuthApi::payload_for(buyer(id));
        let email = format!("{id}@vikareta.com");
        self.api.register_account(&email, "hunter2", payload);
        LoginCredentials {
            email,
            password: "hunter2".to_owned(),
        }
    }
}

/// Route coordinator log output through the test harness capture.
///
/// Idempotent; later calls after the first subscriber wins are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

#[must_use]
pub fn buyer(id: &str) -> User {
    #[allow(clippy::unwrap_used)]
    User::new(id, UserRole::Buyer).unwrap()
}
