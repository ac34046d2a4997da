//! Connection configuration.
//!
//! Each [`crate::participant::Participant`]-owning component carries its own
//! [`Configuration`] value, threaded through the API, auth, and connection
//! layers. There is no process-wide configuration singleton, so multiple
//! components can coexist in one process without overwriting each other's
//! credentials.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::error;

/// Deployment environment a component connects against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development endpoints.
    Dev,
    /// Production endpoints.
    #[default]
    Prod,
    /// Bundled local configuration, no remote-config fetch.
    Local,
}

impl Environment {
    /// Normalize to the environments the transport accepts.
    ///
    /// The transport only distinguishes `dev` and `prod`; everything that is
    /// not `prod` connects to `dev`.
    #[must_use]
    pub fn normalized(self) -> Environment {
        match self {
            Environment::Prod => Environment::Prod,
            _ => Environment::Dev,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Environment::Dev => "dev",
            Environment::Prod => "prod",
            Environment::Local => "local",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Environment {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            "local" => Ok(Environment::Local),
            other => {
                error!(environment = %other, "Unrecognized environment");
                Err(ValidationError::InvalidEnvironment(other.to_string()))
            }
        }
    }
}

/// Dumb, type-erased key/value store addressed by dotted paths.
///
/// `set("a.b", v)` creates intermediate objects as needed; `get` returns
/// `None` when any path segment is absent. No validation happens here.
#[derive(Debug)]
pub struct ConfigStore {
    root: RwLock<Value>,
}

impl ConfigStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: RwLock::new(Value::Object(serde_json::Map::new())),
        }
    }

    /// Write a value at a dotted path, creating intermediate objects.
    ///
    /// A non-object value sitting on the path is replaced by an object.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let mut root = self.root.write().expect("config store lock poisoned");

        let mut segments: Vec<&str> = key.split('.').collect();
        let last = match segments.pop() {
            Some(last) => last,
            None => return,
        };

        let mut cur = &mut *root;
        for segment in segments {
            if !cur.is_object() {
                *cur = Value::Object(serde_json::Map::new());
            }
            cur = cur
                .as_object_mut()
                .expect("just ensured object")
                .entry(segment.to_string())
                .or_insert(Value::Null);
        }
        if !cur.is_object() {
            *cur = Value::Object(serde_json::Map::new());
        }
        cur.as_object_mut()
            .expect("just ensured object")
            .insert(last.to_string(), value);
    }

    /// Read the value at a dotted path.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let root = self.root.read().expect("config store lock poisoned");
        let mut cur = &*root;
        for segment in key.split('.') {
            cur = cur.get(segment)?;
        }
        Some(cur.clone())
    }

    /// Read the value at a dotted path, falling back to `default` when the
    /// path is absent or the stored value has a different shape.
    #[must_use]
    pub fn get_or<T: serde::de::DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or(default)
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Typed, cloneable view over one [`ConfigStore`].
///
/// Cloning shares the underlying store; a component hands clones to its
/// API, auth, and connection layers.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    store: Arc<ConfigStore>,
}

impl Configuration {
    /// Create a configuration backed by a fresh store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Access the underlying type-erased store.
    #[must_use]
    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    fn get_string(&self, key: &str) -> Option<String> {
        self.store
            .get(key)
            .and_then(|v| v.as_str().map(str::to_string))
    }

    /// The API key, once set or exchanged.
    #[must_use]
    pub fn api_key(&self) -> Option<String> {
        self.get_string("api_key")
    }

    pub fn set_api_key(&self, api_key: &str) {
        self.store.set("api_key", api_key);
    }

    /// The developer secret, server-like runtimes only.
    #[must_use]
    pub fn secret(&self) -> Option<String> {
        self.get_string("secret")
    }

    pub fn set_secret(&self, secret: &str) {
        self.store.set("secret", secret);
    }

    /// The client id paired with the secret.
    #[must_use]
    pub fn client_id(&self) -> Option<String> {
        self.get_string("client_id")
    }

    pub fn set_client_id(&self, client_id: &str) {
        self.store.set("client_id", client_id);
    }

    /// The room id this component groups its channels under.
    #[must_use]
    pub fn room_id(&self) -> Option<String> {
        self.get_string("room_id")
    }

    pub fn set_room_id(&self, room_id: &str) {
        self.store.set("room_id", room_id);
    }

    /// The resolved API base URL.
    #[must_use]
    pub fn api_url(&self) -> Option<String> {
        self.get_string("api_url")
    }

    pub fn set_api_url(&self, api_url: &str) {
        self.store.set("api_url", api_url);
    }

    /// The configured environment, defaulting to [`Environment::Prod`].
    #[must_use]
    pub fn environment(&self) -> Environment {
        self.get_string("environment")
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn set_environment(&self, environment: Environment) {
        self.store.set("environment", environment.to_string());
    }

    /// Whether debug logging was requested.
    #[must_use]
    pub fn debug(&self) -> bool {
        self.store.get_or("debug", false)
    }

    pub fn set_debug(&self, debug: bool) {
        self.store.set("debug", debug);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_store_set_get_flat() {
        let store = ConfigStore::new();
        store.set("api_key", "key-123");
        assert_eq!(store.get("api_key"), Some(json!("key-123")));
        assert_eq!(store.get("missing"), None);
    }

    #[test]
    fn test_store_dotted_paths() {
        let store = ConfigStore::new();
        store.set("limits.realtime.can_use", true);
        assert_eq!(store.get("limits.realtime.can_use"), Some(json!(true)));
        assert_eq!(store.get("limits.realtime"), Some(json!({"can_use": true})));
        assert_eq!(store.get("limits.storage.can_use"), None);
    }

    #[test]
    fn test_store_overwrites_scalar_on_path() {
        let store = ConfigStore::new();
        store.set("a", 1);
        store.set("a.b", 2);
        assert_eq!(store.get("a.b"), Some(json!(2)));
    }

    #[test]
    fn test_store_get_or_default() {
        let store = ConfigStore::new();
        assert!(!store.get_or("debug", false));
        store.set("debug", true);
        assert!(store.get_or("debug", false));
        // Wrong shape falls back to the default
        store.set("debug", "yes");
        assert!(!store.get_or("debug", false));
    }

    #[test]
    fn test_environment_parse_and_normalize() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("prod".parse::<Environment>().unwrap(), Environment::Prod);
        assert_eq!("local".parse::<Environment>().unwrap(), Environment::Local);
        assert!(matches!(
            "staging".parse::<Environment>(),
            Err(ValidationError::InvalidEnvironment(_))
        ));

        assert_eq!(Environment::Prod.normalized(), Environment::Prod);
        assert_eq!(Environment::Dev.normalized(), Environment::Dev);
        assert_eq!(Environment::Local.normalized(), Environment::Dev);
    }

    #[test]
    fn test_configuration_typed_accessors() {
        let config = Configuration::new();
        assert_eq!(config.environment(), Environment::Prod);
        assert!(config.api_key().is_none());

        config.set_api_key("key-123");
        config.set_environment(Environment::Dev);
        config.set_debug(true);

        assert_eq!(config.api_key().as_deref(), Some("key-123"));
        assert_eq!(config.environment(), Environment::Dev);
        assert!(config.debug());
    }

    #[test]
    fn test_configuration_clone_shares_store() {
        let config = Configuration::new();
        let clone = config.clone();
        clone.set_api_key("shared");
        assert_eq!(config.api_key().as_deref(), Some("shared"));
    }
}
