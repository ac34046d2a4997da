//! The platform API seam and its HTTP implementation.

use crate::error::ApiError;
use crate::limits::{CheckLimitsResponse, RealtimeLimits};
use crate::remote_config::{bundled_local_config, RemoteConfig, REMOTE_CONFIG_BASE_URL};
use async_trait::async_trait;
use reqwest::{Client, Url};
use ripple_core::Environment;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

/// Default request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Build an absolute URL from a base, a path, and query entries.
///
/// # Errors
///
/// Returns [`ApiError::Url`] when the base or the joined path is not a valid
/// URL.
pub fn create_url(base: &str, path: &str, query: &[(&str, &str)]) -> Result<Url, ApiError> {
    let base = Url::parse(base).map_err(|e| ApiError::Url(e.to_string()))?;
    let mut url = base.join(path).map_err(|e| ApiError::Url(e.to_string()))?;
    if !query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in query {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

/// The HTTP surface a `RealtimeComponent` boots against.
///
/// A trait so tests and embedders can substitute a scripted implementation.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// Validate an API key.
    ///
    /// # Errors
    ///
    /// `ApiError::Status(404)` is the "invalid key" shape; other errors are
    /// infrastructure failures.
    async fn check_api_key(&self, base_url: &str, api_key: &str) -> Result<bool, ApiError>;

    /// Fetch the `realtime` usage limits for an API key.
    async fn fetch_limits(&self, base_url: &str, api_key: &str)
        -> Result<RealtimeLimits, ApiError>;

    /// Exchange a `client_id`/`secret` pair for an API key.
    ///
    /// Swallows every transport error: failures are logged and surface as
    /// `None`, never as an `Err`. Callers must treat `None` as failure.
    async fn fetch_api_key(&self, base_url: &str, client_id: &str, secret: &str)
        -> Option<String>;

    /// Fire-and-forget telemetry. The outcome is ignored beyond a debug log.
    async fn send_activity(&self, base_url: &str, user_id: &str);

    /// Resolve the environment-specific API base URL.
    ///
    /// [`Environment::Local`] resolves to the bundled configuration without
    /// any network call.
    async fn fetch_remote_config(&self, environment: Environment)
        -> Result<RemoteConfig, ApiError>;
}

/// reqwest-backed [`PlatformApi`].
pub struct HttpApi {
    http: Client,
    remote_config_base: String,
}

impl HttpApi {
    /// Create a client with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying client's build error.
    pub fn new() -> Result<Self, ApiError> {
        Self::with_timeout(DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a client with a specific request timeout.
    ///
    /// # Errors
    ///
    /// Returns the underlying client's build error.
    pub fn with_timeout(timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            remote_config_base: REMOTE_CONFIG_BASE_URL.to_string(),
        })
    }

    /// Override the remote-config host.
    #[must_use]
    pub fn with_remote_config_base(mut self, base: impl Into<String>) -> Self {
        self.remote_config_base = base.into();
        self
    }
}

#[async_trait]
impl PlatformApi for HttpApi {
    async fn check_api_key(&self, base_url: &str, api_key: &str) -> Result<bool, ApiError> {
        let url = create_url(base_url, "/user/checkapikey", &[])?;
        let response = self
            .http
            .post(url)
            .json(&json!({ "apiKey": api_key }))
            .send()
            .await
            .map_err(ApiError::classify)?;

        if response.status().is_success() {
            Ok(true)
        } else {
            Err(ApiError::Status(response.status().as_u16()))
        }
    }

    async fn fetch_limits(
        &self,
        base_url: &str,
        api_key: &str,
    ) -> Result<RealtimeLimits, ApiError> {
        let url = create_url(base_url, "/user/check_limits_v2", &[("apikey", api_key)])?;
        let response = self.http.get(url).send().await.map_err(ApiError::classify)?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        let body: CheckLimitsResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(body.limits.realtime)
    }

    async fn fetch_api_key(
        &self,
        base_url: &str,
        client_id: &str,
        secret: &str,
    ) -> Option<String> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct KeyResponse {
            api_key: String,
        }

        let url = match create_url(base_url, "/socket/key", &[]) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "Failed to build apiKey exchange URL");
                return None;
            }
        };

        let result = self
            .http
            .get(url)
            .header("client_id", client_id)
            .header("secret", secret)
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                match response.json::<KeyResponse>().await {
                    Ok(body) => Some(body.api_key),
                    Err(e) => {
                        warn!(error = %e, "Failed to decode apiKey exchange response");
                        None
                    }
                }
            }
            Ok(response) => {
                warn!(status = %response.status(), "apiKey exchange refused");
                None
            }
            Err(e) => {
                warn!(error = %e, "apiKey exchange failed");
                None
            }
        }
    }

    async fn send_activity(&self, base_url: &str, user_id: &str) {
        let url = match create_url(base_url, "/activity", &[]) {
            Ok(url) => url,
            Err(e) => {
                debug!(error = %e, "Failed to build activity URL");
                return;
            }
        };

        let result = self
            .http
            .post(url)
            .json(&json!({ "product": "realtime", "userId": user_id }))
            .send()
            .await;

        if let Err(e) = result {
            debug!(error = %e, "Activity telemetry dropped");
        }
    }

    async fn fetch_remote_config(
        &self,
        environment: Environment,
    ) -> Result<RemoteConfig, ApiError> {
        if environment == Environment::Local {
            return Ok(bundled_local_config());
        }

        let env = environment.to_string();
        let url = create_url(
            &self.remote_config_base,
            &format!("/realtime/{env}"),
            &[("env", &env)],
        )?;
        let response = self.http.get(url).send().await.map_err(ApiError::classify)?;

        if !response.status().is_success() {
            return Err(ApiError::Status(response.status().as_u16()));
        }
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_url_plain() {
        let url = create_url("https://api.ripple.dev", "/user/checkapikey", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.ripple.dev/user/checkapikey");
    }

    #[test]
    fn test_create_url_with_query() {
        let url = create_url(
            "https://api.ripple.dev",
            "/user/check_limits_v2",
            &[("apikey", "key-123")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.ripple.dev/user/check_limits_v2?apikey=key-123"
        );
    }

    #[test]
    fn test_create_url_escapes_query() {
        let url = create_url("https://api.ripple.dev", "/activity", &[("q", "a b&c")]).unwrap();
        assert_eq!(url.query(), Some("q=a+b%26c"));
    }

    #[test]
    fn test_create_url_rejects_bad_base() {
        assert!(matches!(
            create_url("not a url", "/path", &[]),
            Err(ApiError::Url(_))
        ));
    }

    #[test]
    fn test_client_construction_is_fallible_not_panicking() {
        assert!(HttpApi::new().is_ok());
        assert!(HttpApi::with_timeout(Duration::from_millis(250)).is_ok());
    }

    #[tokio::test]
    async fn test_local_remote_config_needs_no_network() {
        let api = HttpApi::new().unwrap();
        let config = api.fetch_remote_config(Environment::Local).await.unwrap();
        assert_eq!(config.api_url, crate::remote_config::LOCAL_API_URL);
    }
}
