//! In-memory host implementations.
//!
//! Complete, thread-safe stand-ins for every host seam. Used by the test
//! suites and by headless embeddings that have no real cookie jar or
//! storage to offer.

use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use super::{BeaconSender, CookieJar, KeyValueStore, Navigator, StorageScope};

/// In-memory cookie jar.
///
/// Cookies are plain name/value pairs; domain scoping on `clear` is
/// recorded so tests can assert which domains were targeted.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: RwLock<HashMap<String, String>>,
    cleared: Mutex<Vec<(String, String)>>,
}

impl MemoryCookieJar {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a cookie, as the backend would via `Set-Cookie`.
    pub fn insert(&self, name: &str, value: &str) {
        if let Ok(mut cookies) = self.cookies.write() {
            cookies.insert(name.to_owned(), value.to_owned());
        }
    }

    /// `(name, domain)` pairs passed to [`CookieJar::clear`].
    #[must_use]
    pub fn cleared(&self) -> Vec<(String, String)> {
        self.cleared.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.cookies.read().ok()?.get(name).cloned()
    }

    fn clear(&self, name: &str, domain: &str) {
        if let Ok(mut cookies) = self.cookies.write() {
            cookies.remove(name);
        }
        if let Ok(mut cleared) = self.cleared.lock() {
            cleared.push((name.to_owned(), domain.to_owned()));
        }
    }
}

/// In-memory scoped key-value store.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    persistent: RwLock<HashMap<String, String>>,
    session: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, scope: StorageScope) -> &RwLock<HashMap<String, String>> {
        match scope {
            StorageScope::Persistent => &self.persistent,
            StorageScope::Session => &self.session,
        }
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, scope: StorageScope, key: &str) -> Option<String> {
        self.map(scope).read().ok()?.get(key).cloned()
    }

    fn set(&self, scope: StorageScope, key: &str, value: &str) {
        if let Ok(mut map) = self.map(scope).write() {
            map.insert(key.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, scope: StorageScope, key: &str) {
        if let Ok(mut map) = self.map(scope).write() {
            map.remove(key);
        }
    }
}

/// In-memory navigator that records redirects instead of performing them.
#[derive(Debug, Default)]
pub struct MemoryNavigator {
    current: RwLock<Option<String>>,
    redirects: Mutex<Vec<String>>,
}

impl MemoryNavigator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Navigator that reports the given current URL.
    #[must_use]
    pub fn at(url: &str) -> Self {
        Self {
            current: RwLock::new(Some(url.to_owned())),
            redirects: Mutex::new(Vec::new()),
        }
    }

    /// Every URL passed to [`Navigator::redirect`], oldest first.
    #[must_use]
    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// The most recent redirect, if any.
    #[must_use]
    pub fn last_redirect(&self) -> Option<String> {
        self.redirects().pop()
    }
}

impl Navigator for MemoryNavigator {
    fn current_url(&self) -> Option<String> {
        self.current.read().ok()?.clone()
    }

    fn redirect(&self, url: &str) {
        if let Ok(mut redirects) = self.redirects.lock() {
            redirects.push(url.to_owned());
        }
    }
}

/// In-memory beacon sender that records sent URLs.
///
/// Hosts listed via [`hang_host`](Self::hang_host) never resolve, modeling
/// an unreachable sibling domain; the sync engine's per-beacon timeout is
/// what bounds those sends.
#[derive(Debug, Default)]
pub struct MemoryBeaconSender {
    sent: Mutex<Vec<String>>,
    hanging: Mutex<Vec<String>>,
}

impl MemoryBeaconSender {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every beacon to the given host hang forever.
    pub fn hang_host(&self, host: &str) {
        if let Ok(mut hanging) = self.hanging.lock() {
            hanging.push(host.to_owned());
        }
    }

    /// Every URL handed to [`BeaconSender::send`], oldest first.
    #[must_use]
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    fn is_hanging(&self, url: &str) -> bool {
        self.hanging
            .lock()
            .map(|hanging| hanging.iter().any(|host| url.contains(host.as_str())))
            .unwrap_or(false)
    }
}

#[async_trait]
impl BeaconSender for MemoryBeaconSender {
    async fn send(&self, url: &str) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(url.to_owned());
        }
        if self.is_hanging(url) {
            // Model an unreachable origin: never resolve.
            loop {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_cookie_jar_roundtrip() {
        let jar = MemoryCookieJar::new();
        jar.insert("XSRF-TOKEN", "csrf-1");
        assert_eq!(jar.get("XSRF-TOKEN").as_deref(), Some("csrf-1"));

        jar.clear("XSRF-TOKEN", "vikareta.com");
        assert_eq!(jar.get("XSRF-TOKEN"), None);
        assert_eq!(
            jar.cleared(),
            vec![("XSRF-TOKEN".to_owned(), "vikareta.com".to_owned())]
        );
    }

    #[test]
    fn test_storage_scopes_are_isolated() {
        let store = MemoryKeyValueStore::new();
        store.set(StorageScope::Session, "k", "v");
        assert_eq!(store.get(StorageScope::Persistent, "k"), None);
        assert_eq!(store.get(StorageScope::Session, "k").as_deref(), Some("v"));

        store.remove(StorageScope::Session, "k");
        assert_eq!(store.get(StorageScope::Session, "k"), None);
    }

    #[test]
    fn test_navigator_records_redirects() {
        let nav = MemoryNavigator::at("https://vikareta.com/products");
        assert_eq!(
            nav.current_url().as_deref(),
            Some("https://vikareta.com/products")
        );

        nav.redirect("/auth/login");
        assert_eq!(nav.last_redirect().as_deref(), Some("/auth/login"));
    }

    #[tokio::test]
    async fn test_beacon_records_sends() {
        let beacons = MemoryBeaconSender::new();
        beacons.send("https://dashboard.vikareta.com/sso/receive").await;
        assert_eq!(beacons.sent().len(), 1);
    }
}
