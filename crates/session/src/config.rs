//! Coordinator configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `VIKARETA_API_BASE_URL` - Base URL of the platform REST API
//! - `VIKARETA_MAIN_DOMAIN` - Hostname of the public storefront
//! - `VIKARETA_DASHBOARD_DOMAIN` - Hostname of the dashboard
//! - `VIKARETA_ADMIN_DOMAIN` - Hostname of the admin site
//! - `VIKARETA_SELF_HOST` - Hostname of the current browsing context
//!
//! ## Optional
//! - `VIKARETA_IDLE_TIMEOUT_SECS` - Idle expiry threshold (default: 1800)
//! - `VIKARETA_HEARTBEAT_INTERVAL_SECS` - Heartbeat period (default: 300)
//! - `VIKARETA_ACTIVITY_THROTTLE_SECS` - Activity update throttle (default: 30)

use std::time::Duration;

use thiserror::Error;
use url::Url;

use vikareta_core::{DomainSet, SiteDomain};

/// Idle duration after which a session is judged expired client-side.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Period of the server keep-alive heartbeat.
const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Minimum gap between accepted activity-timestamp updates.
const DEFAULT_ACTIVITY_THROTTLE: Duration = Duration::from_secs(30);

/// Bound on each SSO propagation beacon.
const DEFAULT_SSO_BEACON_TIMEOUT: Duration = Duration::from_secs(5);

/// Bound on each logout propagation beacon.
const DEFAULT_LOGOUT_BEACON_TIMEOUT: Duration = Duration::from_secs(2);

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Current host {0} does not belong to any configured domain")]
    UnknownSelfHost(String),
}

/// Session coordinator configuration.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Base URL of the platform REST API (e.g. `https://api.vikareta.com`).
    pub api_base_url: Url,
    /// Hostnames of the three cooperating sites.
    pub domains: DomainSet,
    /// Hostname of the current browsing context.
    pub self_host: String,
    /// Site the current context belongs to, derived from `self_host`.
    pub current_domain: SiteDomain,
    /// Idle duration after which the session is treated as expired.
    pub idle_timeout: Duration,
    /// Period of the server keep-alive heartbeat.
    pub heartbeat_interval: Duration,
    /// Minimum gap between accepted activity updates.
    pub activity_throttle: Duration,
    /// Bound on each SSO propagation beacon.
    pub sso_beacon_timeout: Duration,
    /// Bound on each logout propagation beacon.
    pub logout_beacon_timeout: Duration,
}

impl CoordinatorConfig {
    /// Build a configuration from explicit values, with default tuning.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidEnvVar`] if the API base URL does not
    /// parse, or [`ConfigError::UnknownSelfHost`] if `self_host` does not
    /// resolve to a configured site.
    pub fn new(api_base_url: &str, domains: DomainSet, self_host: &str) -> Result<Self, ConfigError> {
        let api_base_url = Url::parse(api_base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("VIKARETA_API_BASE_URL".to_string(), e.to_string())
        })?;
        let current_domain = domains
            .resolve(self_host)
            .ok_or_else(|| ConfigError::UnknownSelfHost(self_host.to_string()))?;

        Ok(Self {
            api_base_url,
            domains,
            self_host: self_host.to_string(),
            current_domain,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            activity_throttle: DEFAULT_ACTIVITY_THROTTLE,
            sso_beacon_timeout: DEFAULT_SSO_BEACON_TIMEOUT,
            logout_beacon_timeout: DEFAULT_LOGOUT_BEACON_TIMEOUT,
        })
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = get_required_env("VIKARETA_API_BASE_URL")?;
        let domains = DomainSet {
            main: get_required_env("VIKARETA_MAIN_DOMAIN")?,
            dashboard: get_required_env("VIKARETA_DASHBOARD_DOMAIN")?,
            admin: get_required_env("VIKARETA_ADMIN_DOMAIN")?,
        };
        let self_host = get_required_env("VIKARETA_SELF_HOST")?;

        let mut config = Self::new(&api_base_url, domains, &self_host)?;
        if let Some(secs) = get_duration_secs("VIKARETA_IDLE_TIMEOUT_SECS")? {
            config.idle_timeout = secs;
        }
        if let Some(secs) = get_duration_secs("VIKARETA_HEARTBEAT_INTERVAL_SECS")? {
            config.heartbeat_interval = secs;
        }
        if let Some(secs) = get_duration_secs("VIKARETA_ACTIVITY_THROTTLE_SECS")? {
            config.activity_throttle = secs;
        }

        Ok(config)
    }

    /// Hostname of the API, excluded from sync targets.
    #[must_use]
    pub fn api_host(&self) -> &str {
        self.api_base_url.host_str().unwrap_or_default()
    }

    /// Sibling domains that should receive session propagation: every
    /// configured site except the current one and the API host itself.
    #[must_use]
    pub fn sync_targets(&self) -> Vec<SiteDomain> {
        self.domains
            .others(self.current_domain)
            .into_iter()
            .filter(|&d| self.domains.host(d) != self.api_host())
            .collect()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get an optional environment variable as a duration in whole seconds.
fn get_duration_secs(key: &str) -> Result<Option<Duration>, ConfigError> {
    match std::env::var(key) {
        Err(_) => Ok(None),
        Ok(raw) => raw
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn domains() -> DomainSet {
        DomainSet {
            main: "vikareta.com".to_owned(),
            dashboard: "dashboard.vikareta.com".to_owned(),
            admin: "admin.vikareta.com".to_owned(),
        }
    }

    #[test]
    fn test_new_derives_current_domain() {
        let config =
            CoordinatorConfig::new("https://api.vikareta.com", domains(), "vikareta.com").unwrap();
        assert_eq!(config.current_domain, SiteDomain::Main);
        assert_eq!(config.api_host(), "api.vikareta.com");
    }

    #[test]
    fn test_new_rejects_unknown_host() {
        let err = CoordinatorConfig::new("https://api.vikareta.com", domains(), "evil.example")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSelfHost(_)));
    }

    #[test]
    fn test_new_rejects_bad_url() {
        let err = CoordinatorConfig::new("not a url", domains(), "vikareta.com").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(_, _)));
    }

    #[test]
    fn test_sync_targets_exclude_self() {
        let config = CoordinatorConfig::new(
            "https://api.vikareta.com",
            domains(),
            "dashboard.vikareta.com",
        )
        .unwrap();
        assert_eq!(
            config.sync_targets(),
            vec![SiteDomain::Main, SiteDomain::Admin]
        );
    }

    #[test]
    fn test_default_tuning() {
        let config =
            CoordinatorConfig::new("https://api.vikareta.com", domains(), "vikareta.com").unwrap();
        assert_eq!(config.idle_timeout, Duration::from_secs(1800));
        assert_eq!(config.heartbeat_interval, Duration::from_secs(300));
        assert_eq!(config.activity_throttle, Duration::from_secs(30));
    }
}
