//! Cross-domain sync engine.
//!
//! Makes an authenticated session visible to sibling sites that cannot
//! read each other's cookies: a short-lived signed token is requested per
//! target site, then handed to the target through a fire-and-forget beacon
//! whose response sets the target's own cookies. All per-site propagations
//! run concurrently and are joined with all-settle semantics — one
//! unreachable site never blocks or fails the overall operation.
//!
//! Also owns post-login redirect handling, including the trusted-domain
//! check that prevents open-redirect abuse via a crafted `returnUrl`.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tokio::time::timeout;
use url::Url;

use vikareta_core::SiteDomain;

use crate::api::AuthApi;
use crate::config::CoordinatorConfig;
use crate::host::{BeaconSender, KeyValueStore, Navigator, StorageScope};
use crate::store::keys;

/// Login route on every site.
const LOGIN_ROUTE: &str = "/auth/login";

/// Cross-domain session propagation.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct CrossDomainSync {
    inner: Arc<CrossDomainSyncInner>,
}

struct CrossDomainSyncInner {
    api: Arc<dyn AuthApi>,
    beacons: Arc<dyn BeaconSender>,
    navigator: Arc<dyn Navigator>,
    storage: Arc<dyn KeyValueStore>,
    config: CoordinatorConfig,
}

impl CrossDomainSync {
    #[must_use]
    pub fn new(
        config: CoordinatorConfig,
        api: Arc<dyn AuthApi>,
        beacons: Arc<dyn BeaconSender>,
        navigator: Arc<dyn Navigator>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            inner: Arc::new(CrossDomainSyncInner {
                api,
                beacons,
                navigator,
                storage,
                config,
            }),
        }
    }

    /// Site the current context belongs to.
    #[must_use]
    pub fn current_domain(&self) -> SiteDomain {
        self.inner.config.current_domain
    }

    // =========================================================================
    // Propagation
    // =========================================================================

    /// Propagate the current session to every sibling site.
    ///
    /// Each site gets its own token request and beacon, bounded by the SSO
    /// beacon timeout; all run concurrently and individual failures are
    /// logged, never surfaced. Always resolves.
    pub async fn sync_sso_across_domains(&self) {
        let targets = self.inner.config.sync_targets();
        join_all(targets.into_iter().map(|target| self.propagate_to(target))).await;
    }

    /// Notify every sibling site of a logout.
    ///
    /// Same beacon technique against each site's logout-all endpoint, with
    /// the shorter logout timeout. Always resolves.
    pub async fn propagate_logout(&self) {
        let targets = self.inner.config.sync_targets();
        join_all(
            targets
                .into_iter()
                .map(|target| self.beacon_logout(target)),
        )
        .await;
    }

    async fn propagate_to(&self, target: SiteDomain) {
        let token = match self.inner.api.sso_token(target).await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%target, %error, "sso token request failed; skipping domain");
                return;
            }
        };

        let host = self.inner.config.domains.host(target);
        let url = format!(
            "https://{host}/sso/receive?token={}&t={}",
            urlencoding::encode(&token),
            Utc::now().timestamp_millis()
        );

        self.send_beacon(&url, self.inner.config.sso_beacon_timeout)
            .await;
        tracing::debug!(%target, "sso propagated");
    }

    async fn beacon_logout(&self, target: SiteDomain) {
        let host = self.inner.config.domains.host(target);
        let url = format!(
            "https://{host}/api/auth/logout-all?t={}",
            Utc::now().timestamp_millis()
        );
        self.send_beacon(&url, self.inner.config.logout_beacon_timeout)
            .await;
    }

    /// A beacon resolves on delivery, on error, or on timeout — a beacon
    /// request cannot be aborted once issued, only ignored.
    async fn send_beacon(&self, url: &str, bound: std::time::Duration) {
        if timeout(bound, self.inner.beacons.send(url)).await.is_err() {
            tracing::debug!(url, "beacon timed out; treated as delivered");
        }
    }

    // =========================================================================
    // Redirects
    // =========================================================================

    /// Stash the current URL and send the user to the login route.
    ///
    /// The return URL lives in session-scoped storage so it cannot leak
    /// across long-lived storage.
    pub fn navigate_to_login(&self) {
        let destination = match self.inner.navigator.current_url() {
            Some(current) => {
                self.inner
                    .storage
                    .set(StorageScope::Session, keys::RETURN_URL, &current);
                format!("{LOGIN_ROUTE}?returnUrl={}", urlencoding::encode(&current))
            }
            None => LOGIN_ROUTE.to_owned(),
        };
        self.inner.navigator.redirect(&destination);
    }

    /// Complete a login by sending the user back where they came from.
    ///
    /// The query parameter wins over the stashed session-storage entry. A
    /// return URL is honored only when it is a relative path or its
    /// hostname is a configured trusted domain; anything else is silently
    /// discarded in favor of the site's default route. Returns the route
    /// navigated to.
    pub fn handle_post_login_redirect(&self, return_url_param: Option<&str>) -> String {
        let stashed = self
            .inner
            .storage
            .get(StorageScope::Session, keys::RETURN_URL);
        self.inner
            .storage
            .remove(StorageScope::Session, keys::RETURN_URL);

        let candidate = return_url_param.map(str::to_owned).or(stashed);
        let destination = candidate
            .filter(|url| self.is_safe_return_url(url))
            .unwrap_or_else(|| self.current_domain().default_route().to_owned());

        self.inner.navigator.redirect(&destination);
        destination
    }

    /// Whitelist check preventing open-redirect abuse.
    fn is_safe_return_url(&self, candidate: &str) -> bool {
        // Relative paths stay on the current origin. "//host" is
        // scheme-relative and absolute, so it must go through host checks.
        if candidate.starts_with('/') && !candidate.starts_with("//") {
            return true;
        }

        let Ok(url) = Url::parse(candidate) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        url.host_str()
            .is_some_and(|host| self.inner.config.domains.is_trusted_host(host))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::api::StubAuthApi;
    use crate::host::memory::{MemoryBeaconSender, MemoryKeyValueStore, MemoryNavigator};
    use vikareta_core::DomainSet;

    fn config(self_host: &str) -> CoordinatorConfig {
        CoordinatorConfig::new(
            "https://api.vikareta.com",
            DomainSet {
                main: "vikareta.com".to_owned(),
                dashboard: "dashboard.vikareta.com".to_owned(),
                admin: "admin.vikareta.com".to_owned(),
            },
            self_host,
        )
        .unwrap()
    }

    struct Fixture {
        sync: CrossDomainSync,
        api: StubAuthApi,
        beacons: Arc<MemoryBeaconSender>,
        navigator: Arc<MemoryNavigator>,
        storage: Arc<MemoryKeyValueStore>,
    }

    fn fixture(self_host: &str) -> Fixture {
        let api = StubAuthApi::new();
        let beacons = Arc::new(MemoryBeaconSender::new());
        let navigator = Arc::new(MemoryNavigator::at(&format!("https://{self_host}/cart")));
        let storage = Arc::new(MemoryKeyValueStore::new());
        let sync = CrossDomainSync::new(
            config(self_host),
            Arc::new(api.clone()),
            beacons.clone(),
            navigator.clone(),
            storage.clone(),
        );
        Fixture {
            sync,
            api,
            beacons,
            navigator,
            storage,
        }
    }

    #[tokio::test]
    async fn test_propagates_to_both_siblings() {
        let fx = fixture("vikareta.com");
        fx.sync.sync_sso_across_domains().await;

        let sent = fx.beacons.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().any(|u| u.starts_with("https://dashboard.vikareta.com/sso/receive?token=")));
        assert!(sent.iter().any(|u| u.starts_with("https://admin.vikareta.com/sso/receive?token=")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_domain_bounded_by_timeout() {
        let fx = fixture("vikareta.com");
        fx.beacons.hang_host("admin.vikareta.com");

        let begun = tokio::time::Instant::now();
        fx.sync.sync_sso_across_domains().await;
        let elapsed = begun.elapsed();

        // One hanging sibling costs the beacon timeout, never more.
        assert!(elapsed >= std::time::Duration::from_secs(5));
        assert!(elapsed < std::time::Duration::from_secs(6));
        assert_eq!(fx.beacons.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_token_failure_skips_domain_only() {
        let fx = fixture("vikareta.com");
        fx.api.fail_transport(crate::api::Endpoint::SsoToken);

        // Resolves without error even though no beacon could be sent.
        fx.sync.sync_sso_across_domains().await;
        assert!(fx.beacons.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_beacons_use_short_timeout() {
        let fx = fixture("vikareta.com");
        fx.beacons.hang_host("dashboard.vikareta.com");

        let begun = tokio::time::Instant::now();
        fx.sync.propagate_logout().await;
        let elapsed = begun.elapsed();

        assert!(elapsed >= std::time::Duration::from_secs(2));
        assert!(elapsed < std::time::Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_navigate_to_login_stashes_return_url() {
        let fx = fixture("vikareta.com");
        fx.sync.navigate_to_login();

        assert_eq!(
            fx.storage
                .get(StorageScope::Session, keys::RETURN_URL)
                .as_deref(),
            Some("https://vikareta.com/cart")
        );
        let redirect = fx.navigator.last_redirect().unwrap();
        assert!(redirect.starts_with("/auth/login?returnUrl="));
    }

    #[tokio::test]
    async fn test_redirect_honors_trusted_return_url() {
        let fx = fixture("vikareta.com");
        let dest = fx
            .sync
            .handle_post_login_redirect(Some("https://dashboard.vikareta.com/orders"));
        assert_eq!(dest, "https://dashboard.vikareta.com/orders");
    }

    #[tokio::test]
    async fn test_redirect_rejects_untrusted_hosts() {
        let fx = fixture("vikareta.com");
        for evil in [
            "https://evil.example/phish",
            "https://vikareta.com.evil.example/",
            "//evil.example/phish",
            "javascript:alert(1)",
            "https://notvikareta.com/",
        ] {
            let dest = fx.sync.handle_post_login_redirect(Some(evil));
            assert_eq!(dest, "/", "{evil} must fall back to the default route");
        }
    }

    #[tokio::test]
    async fn test_redirect_falls_back_to_role_default() {
        let fx = fixture("dashboard.vikareta.com");
        let dest = fx.sync.handle_post_login_redirect(None);
        assert_eq!(dest, "/dashboard");
    }

    #[tokio::test]
    async fn test_redirect_uses_stashed_url_when_no_param() {
        let fx = fixture("vikareta.com");
        fx.storage
            .set(StorageScope::Session, keys::RETURN_URL, "/checkout");

        let dest = fx.sync.handle_post_login_redirect(None);
        assert_eq!(dest, "/checkout");
        // One-shot: the stash is consumed.
        assert_eq!(fx.storage.get(StorageScope::Session, keys::RETURN_URL), None);
    }
}
