//! Host-environment trait seams.
//!
//! The coordinator never touches a browser global directly. Every
//! environment primitive it needs is a trait here: cookies, key-value
//! storage, fire-and-forget beacons, and navigation. A web host implements
//! these over `document.cookie`, `localStorage`/`sessionStorage`, image
//! beacons, and `window.location`; [`memory`] provides complete in-process
//! implementations for tests and headless embedding; [`beacon`] provides an
//! HTTP [`BeaconSender`].

pub mod beacon;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::notify::SessionChangeNotifier;

/// Lifetime scope of a key-value entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// Survives the browsing context (`localStorage` on the web).
    Persistent,
    /// Tab-lifetime only (`sessionStorage` on the web).
    Session,
}

/// Read and clear access to the host's cookie jar.
///
/// The coordinator never *sets* cookies; the backend mints them HttpOnly
/// through the cookie-exchange endpoint. It only reads the CSRF cookie and
/// issues per-domain clears on logout.
pub trait CookieJar: Send + Sync {
    /// Value of a cookie visible to this context, if any.
    fn get(&self, name: &str) -> Option<String>;

    /// Best-effort clear of a cookie scoped to the given domain.
    fn clear(&self, name: &str, domain: &str);
}

/// Scoped string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, scope: StorageScope, key: &str) -> Option<String>;
    fn set(&self, scope: StorageScope, key: &str, value: &str);
    fn remove(&self, scope: StorageScope, key: &str);
}

/// Current-location access and hard redirects.
pub trait Navigator: Send + Sync {
    /// Full URL of the current context, if one exists.
    fn current_url(&self) -> Option<String>;

    /// Hard navigation; the current context is torn down afterwards.
    fn redirect(&self, url: &str);
}

/// Fire-and-forget cross-origin notification.
///
/// Delivery, rejection, and silence are all treated as "delivered" by the
/// caller; the sync engine bounds each send with its own timeout. An
/// implementation must therefore never be relied on to report failure.
#[async_trait]
pub trait BeaconSender: Send + Sync {
    async fn send(&self, url: &str);
}

/// The full bundle of host seams the coordinator is built from.
#[derive(Clone)]
pub struct HostEnvironment {
    pub cookies: Arc<dyn CookieJar>,
    pub storage: Arc<dyn KeyValueStore>,
    pub beacons: Arc<dyn BeaconSender>,
    pub navigator: Arc<dyn Navigator>,
    pub notifier: Arc<dyn SessionChangeNotifier>,
}
