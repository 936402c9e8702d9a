//! Site-domain matching.
//!
//! The marketplace spans three cooperating sites that cannot read each
//! other's cookies. [`SiteDomain`] names them; [`DomainSet`] holds the
//! configured hostnames and resolves which site a given hostname belongs to.

use serde::{Deserialize, Serialize};

/// One of the cooperating marketplace sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteDomain {
    /// Public storefront.
    Main,
    /// Seller/buyer dashboard.
    Dashboard,
    /// Platform administration.
    Admin,
}

impl SiteDomain {
    /// All site domains, in propagation order.
    pub const ALL: [Self; 3] = [Self::Main, Self::Dashboard, Self::Admin];

    /// Default post-login route for this site.
    #[must_use]
    pub const fn default_route(self) -> &'static str {
        match self {
            Self::Main => "/",
            Self::Dashboard | Self::Admin => "/dashboard",
        }
    }
}

impl core::fmt::Display for SiteDomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Dashboard => "dashboard",
            Self::Admin => "admin",
        };
        write!(f, "{name}")
    }
}

/// The configured hostnames of the three cooperating sites.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainSet {
    pub main: String,
    pub dashboard: String,
    pub admin: String,
}

impl DomainSet {
    /// Hostname configured for a site.
    #[must_use]
    pub fn host(&self, domain: SiteDomain) -> &str {
        match domain {
            SiteDomain::Main => &self.main,
            SiteDomain::Dashboard => &self.dashboard,
            SiteDomain::Admin => &self.admin,
        }
    }

    /// Resolve which site a hostname belongs to.
    ///
    /// A hostname matches a site exactly or as a dot-separated suffix, so
    /// `www.vikareta.com` resolves to the site configured as
    /// `vikareta.com`. Returns `None` for hostnames outside the set.
    ///
    /// An exact match wins over a suffix match, and the longest configured
    /// suffix wins among suffix matches, so `dashboard.vikareta.com` is not
    /// swallowed by a site configured as `vikareta.com`.
    #[must_use]
    pub fn resolve(&self, hostname: &str) -> Option<SiteDomain> {
        SiteDomain::ALL
            .into_iter()
            .find(|&domain| self.host(domain) == hostname)
            .or_else(|| {
                SiteDomain::ALL
                    .into_iter()
                    .filter(|&domain| host_matches(hostname, self.host(domain)))
                    .max_by_key(|&domain| self.host(domain).len())
            })
    }

    /// The sites other than `current`, in propagation order.
    #[must_use]
    pub fn others(&self, current: SiteDomain) -> Vec<SiteDomain> {
        SiteDomain::ALL
            .into_iter()
            .filter(|&d| d != current)
            .collect()
    }

    /// Whether a hostname belongs to any configured site.
    #[must_use]
    pub fn is_trusted_host(&self, hostname: &str) -> bool {
        self.resolve(hostname).is_some()
    }
}

/// Exact or dot-suffix hostname match.
fn host_matches(hostname: &str, configured: &str) -> bool {
    hostname == configured
        || hostname
            .strip_suffix(configured)
            .is_some_and(|prefix| prefix.ends_with('.'))
}
