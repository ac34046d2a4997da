//! API key validation.

use crate::client::PlatformApi;
use crate::error::ApiError;
use ripple_core::Configuration;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

/// Auth validation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The configuration holds no API key.
    #[error("[ripple] API key is not set")]
    MissingApiKey,

    /// The configuration holds no resolved API URL.
    #[error("[ripple] API URL is not resolved")]
    MissingApiUrl,

    /// The validation call failed for a reason other than a 404.
    #[error("[ripple] Unable to validate API key")]
    Validation,
}

/// Answers "is this apiKey valid" on top of the platform API.
pub struct AuthService {
    api: Arc<dyn PlatformApi>,
}

impl AuthService {
    /// Create a service over the given platform API.
    #[must_use]
    pub fn new(api: Arc<dyn PlatformApi>) -> Self {
        Self { api }
    }

    /// Validate the API key stored in `config`.
    ///
    /// A 404 from the check endpoint means "key unknown" and yields
    /// `Ok(false)`; any other failure is converted into
    /// [`AuthError::Validation`].
    ///
    /// # Errors
    ///
    /// Returns an error when the configuration is incomplete or the
    /// validation call failed for infrastructure reasons.
    pub async fn is_valid_api_key(&self, config: &Configuration) -> Result<bool, AuthError> {
        let api_key = config.api_key().ok_or_else(|| {
            error!("{}", AuthError::MissingApiKey);
            AuthError::MissingApiKey
        })?;
        let api_url = config.api_url().ok_or_else(|| {
            error!("{}", AuthError::MissingApiUrl);
            AuthError::MissingApiUrl
        })?;

        match self.api.check_api_key(&api_url, &api_key).await {
            Ok(valid) => Ok(valid),
            Err(ApiError::Status(404)) => Ok(false),
            Err(e) => {
                error!(error = %e, "Unable to validate API key");
                Err(AuthError::Validation)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::RealtimeLimits;
    use crate::remote_config::RemoteConfig;
    use async_trait::async_trait;
    use ripple_core::Environment;

    /// Scripted platform API answering only `check_api_key`.
    struct ScriptedApi {
        answer: Result<bool, u16>,
    }

    #[async_trait]
    impl PlatformApi for ScriptedApi {
        async fn check_api_key(&self, _base: &str, _key: &str) -> Result<bool, ApiError> {
            match self.answer {
                Ok(valid) => Ok(valid),
                Err(status) => Err(ApiError::Status(status)),
            }
        }

        async fn fetch_limits(&self, _: &str, _: &str) -> Result<RealtimeLimits, ApiError> {
            unreachable!("not exercised")
        }

        async fn fetch_api_key(&self, _: &str, _: &str, _: &str) -> Option<String> {
            unreachable!("not exercised")
        }

        async fn send_activity(&self, _: &str, _: &str) {}

        async fn fetch_remote_config(&self, _: Environment) -> Result<RemoteConfig, ApiError> {
            unreachable!("not exercised")
        }
    }

    fn configured() -> Configuration {
        let config = Configuration::new();
        config.set_api_key("key-123");
        config.set_api_url("https://api.ripple.dev");
        config
    }

    #[tokio::test]
    async fn test_valid_key() {
        let service = AuthService::new(Arc::new(ScriptedApi { answer: Ok(true) }));
        assert!(service.is_valid_api_key(&configured()).await.unwrap());
    }

    #[tokio::test]
    async fn test_404_means_invalid_not_error() {
        let service = AuthService::new(Arc::new(ScriptedApi { answer: Err(404) }));
        assert!(!service.is_valid_api_key(&configured()).await.unwrap());
    }

    #[tokio::test]
    async fn test_other_failures_become_validation_error() {
        let service = AuthService::new(Arc::new(ScriptedApi { answer: Err(500) }));
        assert_eq!(
            service.is_valid_api_key(&configured()).await.unwrap_err(),
            AuthError::Validation
        );
    }

    #[tokio::test]
    async fn test_missing_configuration() {
        let service = AuthService::new(Arc::new(ScriptedApi { answer: Ok(true) }));

        let config = Configuration::new();
        assert_eq!(
            service.is_valid_api_key(&config).await.unwrap_err(),
            AuthError::MissingApiKey
        );

        config.set_api_key("key-123");
        assert_eq!(
            service.is_valid_api_key(&config).await.unwrap_err(),
            AuthError::MissingApiUrl
        );
    }
}
