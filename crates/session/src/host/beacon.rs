//! HTTP beacon sender.

use async_trait::async_trait;

use super::BeaconSender;

/// Sends beacons as plain GET requests.
///
/// The target origin does its work through response headers (`Set-Cookie`
/// on the SSO receive endpoint), so the response body and status are
/// irrelevant. Errors are logged and swallowed: a beacon has no failure
/// mode from the caller's point of view.
#[derive(Debug, Clone, Default)]
pub struct HttpBeaconSender {
    client: reqwest::Client,
}

impl HttpBeaconSender {
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl BeaconSender for HttpBeaconSender {
    async fn send(&self, url: &str) {
        match self.client.get(url).send().await {
            Ok(response) => {
                tracing::debug!(url, status = %response.status(), "beacon delivered");
            }
            Err(error) => {
                // Treated as delivered regardless; the receiving origin may
                // have processed the request even when the response failed.
                tracing::debug!(url, %error, "beacon send failed");
            }
        }
    }
}
