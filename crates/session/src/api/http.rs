//! HTTP implementation of the auth API contract.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use vikareta_core::{AuthData, SessionId, SiteDomain, User};

use crate::config::CoordinatorConfig;
use crate::host::CookieJar;

use super::{ApiError, AuthApi, AuthPayload, RefreshPayload};

/// Name of the CSRF cookie issued by the backend.
const CSRF_COOKIE: &str = "XSRF-TOKEN";

/// Header the backend expects the CSRF cookie echoed back in.
const CSRF_HEADER: &str = "X-XSRF-TOKEN";

/// Error body shape the backend uses for non-2xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Client for the platform auth API.
///
/// Cheap to clone; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct HttpAuthApi {
    inner: Arc<HttpAuthApiInner>,
}

struct HttpAuthApiInner {
    client: reqwest::Client,
    base_url: Url,
    cookies: Arc<dyn CookieJar>,
}

impl HttpAuthApi {
    /// Create a new auth API client.
    ///
    /// The cookie jar supplies the CSRF token attached to every mutating
    /// request; session cookies ride on the HTTP client's own jar, so
    /// `Set-Cookie` from login is replayed on every later call.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created. This should never happen
    /// under normal circumstances as we use standard TLS configuration.
    #[must_use]
    pub fn new(config: &CoordinatorConfig, cookies: Arc<dyn CookieJar>) -> Self {
        let client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            inner: Arc::new(HttpAuthApiInner {
                client,
                base_url: config.api_base_url.clone(),
                cookies,
            }),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.inner
            .base_url
            .join(path)
            .map_err(|_| ApiError::InvalidResponse)
    }

    /// POST a JSON body with the CSRF header attached when the cookie is
    /// present, folding non-2xx responses into [`ApiError::Status`].
    async fn post_json(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.endpoint(path)?;
        let mut request = self.inner.client.post(url).json(body);
        if let Some(token) = self.inner.cookies.get(CSRF_COOKIE) {
            request = request.header(CSRF_HEADER, token);
        }

        let response = request.send().await?;
        Self::check_status(response).await
    }

    /// Decode a 2xx JSON body, mapping decode failures to the generic
    /// invalid-response error.
    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
        response.json().await.map_err(|_| ApiError::InvalidResponse)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = response
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.to_string());

        Err(ApiError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn login(&self, email: &str, password: &str) -> Result<AuthPayload, ApiError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let response = self.post_json("/api/auth/login", &body).await?;
        Self::decode(response).await
    }

    async fn guest_session(&self) -> Result<AuthPayload, ApiError> {
        let response = self
            .post_json("/api/auth/guest", &serde_json::json!({}))
            .await?;
        Self::decode(response).await
    }

    async fn logout_all(&self) -> Result<(), ApiError> {
        self.post_json("/api/auth/logout-all", &serde_json::json!({}))
            .await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<RefreshPayload, ApiError> {
        let response = self
            .post_json("/api/auth/refresh", &serde_json::json!({}))
            .await?;
        Self::decode(response).await
    }

    async fn me(&self) -> Result<User, ApiError> {
        #[derive(Deserialize)]
        struct MeResponse {
            user: User,
        }

        let url = self.endpoint("/api/auth/me")?;
        let response = self.inner.client.get(url).send().await?;
        let response = Self::check_status(response).await?;
        let body: MeResponse = Self::decode(response).await?;
        Ok(body.user)
    }

    async fn exchange_sso(&self, data: &AuthData) -> Result<(), ApiError> {
        let body = serde_json::json!({
            "accessToken": data.tokens.access_token.expose_secret(),
            "refreshToken": data.tokens.refresh_token.expose_secret(),
            "sessionId": data.session_id,
            "domain": data.domain,
        });
        // Response body ignored; the backend's work happens in Set-Cookie.
        self.post_json("/api/auth/exchange-sso", &body).await?;
        Ok(())
    }

    async fn sso_token(&self, target: SiteDomain) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct SsoTokenResponse {
            token: String,
        }

        let body = serde_json::json!({ "target": target });
        let response = self.post_json("/api/auth/sso-token", &body).await?;
        let body: SsoTokenResponse = Self::decode(response).await?;
        Ok(body.token)
    }

    async fn validate_session(&self, session_id: &SessionId) -> Result<bool, ApiError> {
        let body = serde_json::json!({ "sessionId": session_id });
        match self.post_json("/api/auth/session", &body).await {
            Ok(_) => Ok(true),
            // 4xx means "not valid", not "call failed".
            Err(ApiError::Status { status, .. }) if (400..500).contains(&status) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn heartbeat(&self, session_id: &SessionId) -> Result<(), ApiError> {
        let body = serde_json::json!({ "sessionId": session_id });
        self.post_json("/api/auth/heartbeat", &body).await?;
        Ok(())
    }
}
