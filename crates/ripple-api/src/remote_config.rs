//! Environment-specific API base URL resolution.

use serde::{Deserialize, Serialize};

/// Default host serving remote configuration.
pub const REMOTE_CONFIG_BASE_URL: &str = "https://remote-config.ripple.dev";

/// API base URL used by the bundled `local` configuration.
pub const LOCAL_API_URL: &str = "http://localhost:3000";

/// Resolved remote configuration for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    /// Base URL for the platform API.
    pub api_url: String,
    /// Configuration version the host served.
    pub version: String,
}

/// The bundled configuration for the `local` environment; no network call.
#[must_use]
pub fn bundled_local_config() -> RemoteConfig {
    RemoteConfig {
        api_url: LOCAL_API_URL.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundled_local_config() {
        let config = bundled_local_config();
        assert_eq!(config.api_url, LOCAL_API_URL);
        assert_eq!(config.version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_wire_shape() {
        let config: RemoteConfig = serde_json::from_value(json!({
            "apiUrl": "https://api.ripple.dev",
            "version": "1.4.0"
        }))
        .unwrap();
        assert_eq!(config.api_url, "https://api.ripple.dev");
        assert_eq!(config.version, "1.4.0");
    }
}
