//! The realtime component: the one handle applications hold.
//!
//! Construction validates synchronously and kicks off an async boot
//! (remote config, optional secret exchange, limits + key checks, transport
//! client). Channels are created through [`RealtimeComponent::connect`],
//! which waits for the boot to finish and dedupes concurrent joins.

use crate::channel::Channel;
use crate::connection::{ConnectionManager, DEFAULT_CONNECTION_LIMIT};
use crate::error::ComponentError;
use dashmap::DashMap;
use ripple_api::{AuthService, MaxParticipants, PlatformApi};
use ripple_core::{
    validate_channel_name, Callback, ComponentState, Configuration, Environment, EventRegistry,
    Participant, StateMachine, SubscriptionId, ValidationError,
};
use ripple_transport::{ClientOptions, TransportFactory};
use serde_json::{json, Value};
use std::fmt;
use std::sync::{Arc, OnceLock};
use tokio::sync::{watch, OnceCell};
use tracing::{debug, error, warn};

/// Account credentials.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Public API key, legal only in [`Runtime::Browser`].
    ApiKey(String),
    /// Developer credential pair, legal only in [`Runtime::Server`].
    Secret { client_id: String, secret: String },
}

/// Where the component runs. Decides which [`Auth`] shape is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Runtime {
    Browser,
    #[default]
    Server,
}

/// Construction options beyond the credentials.
#[derive(Debug, Clone, Default)]
pub struct ComponentOptions {
    /// The local participant; synthesized (`sv-` prefixed) when absent.
    pub participant: Option<Participant>,
    /// Target environment; defaults to `prod`.
    pub environment: Option<Environment>,
    /// Room scope recorded in the configuration, when the application has one.
    pub room_id: Option<String>,
    pub runtime: Runtime,
    pub debug: bool,
}

/// Lifecycle notifications published to component subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentEvent {
    /// Boot finished; the component is usable.
    Mount,
    /// The component was destroyed.
    Unmount,
    /// The lifecycle state changed; payload is the state name.
    StateChanged,
}

/// Entry point of the engine.
///
/// Each component owns its own [`Configuration`]; several components with
/// different credentials coexist in one process.
pub struct RealtimeComponent {
    config: Configuration,
    participant: Participant,
    runtime: Runtime,
    state: StateMachine<ComponentState>,
    events: EventRegistry<ComponentEvent, Value>,
    channels: DashMap<String, Arc<OnceCell<Arc<Channel>>>>,
    connection: OnceLock<Arc<ConnectionManager>>,
    connection_limit: OnceLock<usize>,
    boot_error: OnceLock<ComponentError>,
    api: Arc<dyn PlatformApi>,
    transport: Arc<dyn TransportFactory>,
}

impl fmt::Debug for RealtimeComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RealtimeComponent")
            .field("participant", &self.participant.id)
            .field("runtime", &self.runtime)
            .field("state", &self.state.current())
            .finish_non_exhaustive()
    }
}

impl RealtimeComponent {
    /// Validate the inputs, persist the configuration, and start booting.
    ///
    /// The returned component is `STOPPED` until the boot task finishes;
    /// [`RealtimeComponent::connect`] calls wait for it transparently.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] when the credentials do not match the
    /// runtime or the participant id is malformed. Boot failures are async
    /// and surface through [`RealtimeComponent::boot_error`] instead.
    pub fn new(
        auth: Auth,
        options: ComponentOptions,
        api: Arc<dyn PlatformApi>,
        transport: Arc<dyn TransportFactory>,
    ) -> Result<Arc<Self>, ValidationError> {
        validate_auth(&auth, options.runtime)?;

        let participant = match options.participant {
            // Re-validate: the caller may have built the value by hand.
            Some(p) => Participant::new(p.id, p.name)?,
            None => Participant::generate(),
        };

        let config = Configuration::new();
        match &auth {
            Auth::ApiKey(key) => config.set_api_key(key),
            Auth::Secret { client_id, secret } => {
                config.set_client_id(client_id);
                config.set_secret(secret);
            }
        }
        config.set_environment(options.environment.unwrap_or(Environment::Prod));
        if let Some(room_id) = &options.room_id {
            config.set_room_id(room_id);
        }
        config.set_debug(options.debug);

        let component = Arc::new(Self {
            config,
            participant,
            runtime: options.runtime,
            state: StateMachine::new(),
            events: EventRegistry::new(),
            channels: DashMap::new(),
            connection: OnceLock::new(),
            connection_limit: OnceLock::new(),
            boot_error: OnceLock::new(),
            api,
            transport,
        });

        let booting = component.clone();
        tokio::spawn(async move {
            if let Err(err) = booting.start().await {
                error!(error = %err, "Component boot failed");
                let _ = booting.boot_error.set(err);
            }
        });

        Ok(component)
    }

    /// The boot pipeline. Any failure leaves the component `STOPPED`.
    async fn start(self: &Arc<Self>) -> Result<(), ComponentError> {
        let environment = self.config.environment();
        let remote = self.api.fetch_remote_config(environment).await?;
        self.config.set_api_url(&remote.api_url);

        if self.runtime == Runtime::Server {
            self.exchange_secret(&remote.api_url).await?;
        }
        let api_key = self.config.api_key().unwrap_or_default();

        let auth = AuthService::new(self.api.clone());
        let (limits, valid) = tokio::try_join!(
            async {
                let limits = self.api.fetch_limits(&remote.api_url, &api_key).await?;
                if !limits.can_use {
                    return Err(ComponentError::LimitExceeded);
                }
                Ok(limits)
            },
            async { Ok::<_, ComponentError>(auth.is_valid_api_key(&self.config).await?) },
        )?;
        if !valid {
            return Err(ComponentError::InvalidApiKey);
        }

        let limit = match limits.max_participants {
            MaxParticipants::Limited(n) => (n as usize).min(DEFAULT_CONNECTION_LIMIT),
            MaxParticipants::Unlimited => DEFAULT_CONNECTION_LIMIT,
        };
        let _ = self.connection_limit.set(limit);

        let manager = ConnectionManager::create(
            self.transport.as_ref(),
            ClientOptions {
                api_key,
                environment: environment.normalized(),
                participant: self.participant.clone(),
                secret: self.config.secret(),
                client_id: self.config.client_id(),
            },
        )
        .await?;
        let _ = self.connection.set(Arc::new(manager));

        self.state.transition(ComponentState::Started)?;
        debug!(participant = %self.participant.id, "Component started");
        self.events
            .publish(&ComponentEvent::StateChanged, &json!("STARTED"));
        self.events.publish(&ComponentEvent::Mount, &Value::Null);

        let api = self.api.clone();
        let api_url = remote.api_url;
        let user_id = self.participant.id.clone();
        tokio::spawn(async move {
            api.send_activity(&api_url, &user_id).await;
        });

        Ok(())
    }

    /// Trade the clientId/secret pair for an apiKey and persist it.
    async fn exchange_secret(&self, api_url: &str) -> Result<(), ComponentError> {
        let client_id = self.config.client_id().unwrap_or_default();
        let secret = self.config.secret().unwrap_or_default();
        let key = self
            .api
            .fetch_api_key(api_url, &client_id, &secret)
            .await
            .filter(|key| !key.is_empty())
            .ok_or(ComponentError::KeyExchangeFailed)?;
        self.config.set_api_key(&key);
        Ok(())
    }

    /// Connect to the named channel, creating it on first use.
    ///
    /// Concurrent and repeated calls for one name resolve to the same
    /// channel. The call waits for the boot to finish; when the boot failed
    /// the future never resolves (the failure is observable through
    /// [`RealtimeComponent::boot_error`]).
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] for a malformed name, or the
    /// channel-creation error.
    pub async fn connect(self: &Arc<Self>, name: &str) -> Result<Arc<Channel>, ComponentError> {
        validate_channel_name(name).map_err(ComponentError::Validation)?;

        let cell = self
            .channels
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let channel = cell
            .get_or_try_init(|| async {
                self.wait_until_started().await;
                // Set by the boot task before the Started transition.
                let manager = self
                    .connection
                    .get()
                    .cloned()
                    .ok_or(ripple_transport::TransportError::ConnectionClosed)?;
                let limit = self
                    .connection_limit
                    .get()
                    .copied()
                    .unwrap_or(DEFAULT_CONNECTION_LIMIT);
                Channel::create(name, &manager, self.participant.clone(), limit)
                    .await
                    .map_err(ComponentError::Channel)
            })
            .await?;
        Ok(channel.clone())
    }

    /// Destroy the component. Terminal; a second call is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's teardown error.
    pub async fn destroy(&self) -> Result<(), ComponentError> {
        if self.state.current() != ComponentState::Started {
            warn!("Component is not started; destroy ignored");
            return Ok(());
        }
        self.state.transition(ComponentState::Stopped)?;
        self.events
            .publish(&ComponentEvent::StateChanged, &json!("STOPPED"));
        self.events.publish(&ComponentEvent::Unmount, &Value::Null);

        let channels: Vec<Arc<Channel>> = self
            .channels
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect();
        for channel in channels {
            if let Err(err) = channel.disconnect().await {
                warn!(channel = %channel.name(), error = %err, "Channel teardown failed");
            }
        }
        self.channels.clear();

        if let Some(manager) = self.connection.get() {
            manager.destroy().await.map_err(ComponentError::Transport)?;
        }
        debug!("Component destroyed");
        Ok(())
    }

    /// Register a lifecycle callback.
    pub fn subscribe(&self, event: ComponentEvent, callback: Callback<Value>) -> SubscriptionId {
        self.events.subscribe(event, callback)
    }

    /// Remove every callback for a lifecycle event.
    pub fn unsubscribe(&self, event: ComponentEvent) -> bool {
        self.events.unsubscribe(&event)
    }

    /// Remove the single callback registered under `id`.
    pub fn unsubscribe_id(&self, event: ComponentEvent, id: SubscriptionId) -> bool {
        self.events.unsubscribe_id(&event, id)
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ComponentState {
        self.state.current()
    }

    /// Subscribe to lifecycle state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ComponentState> {
        self.state.subscribe()
    }

    /// The boot failure, once one happened.
    #[must_use]
    pub fn boot_error(&self) -> Option<&ComponentError> {
        self.boot_error.get()
    }

    /// The local participant.
    #[must_use]
    pub fn participant(&self) -> &Participant {
        &self.participant
    }

    /// The component's configuration.
    #[must_use]
    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    async fn wait_until_started(&self) {
        let mut rx = self.state.subscribe();
        if rx
            .wait_for(|s| *s == ComponentState::Started)
            .await
            .is_err()
        {
            // The state sender lives as long as the component; an error here
            // means teardown mid-wait. Keep the contract: never resolve.
            std::future::pending::<()>().await;
        }
    }
}

fn validate_auth(auth: &Auth, runtime: Runtime) -> Result<(), ValidationError> {
    match (auth, runtime) {
        (Auth::ApiKey(key), Runtime::Browser) => {
            if key.is_empty() {
                error!("[ripple] apiKey is required");
                return Err(ValidationError::InvalidAuth("apiKey is required"));
            }
            Ok(())
        }
        (Auth::ApiKey(_), Runtime::Server) => {
            error!("[ripple] apiKey authentication is restricted to browser runtimes");
            Err(ValidationError::InvalidAuth(
                "apiKey authentication is restricted to browser runtimes",
            ))
        }
        (Auth::Secret { client_id, secret }, Runtime::Server) => {
            if client_id.is_empty() || secret.is_empty() {
                error!("[ripple] clientId and secret are both required");
                return Err(ValidationError::InvalidAuth(
                    "clientId and secret are both required",
                ));
            }
            Ok(())
        }
        (Auth::Secret { .. }, Runtime::Browser) => {
            error!("[ripple] secret authentication is restricted to server runtimes");
            Err(ValidationError::InvalidAuth(
                "secret authentication is restricted to server runtimes",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_auth_requires_browser_runtime() {
        let err = validate_auth(&Auth::ApiKey("pk_123".into()), Runtime::Server).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidAuth(_)));
        assert!(validate_auth(&Auth::ApiKey("pk_123".into()), Runtime::Browser).is_ok());
    }

    #[test]
    fn test_secret_auth_requires_server_runtime_and_both_fields() {
        let full = Auth::Secret {
            client_id: "cid".into(),
            secret: "sec".into(),
        };
        assert!(validate_auth(&full, Runtime::Server).is_ok());
        assert!(validate_auth(&full, Runtime::Browser).is_err());

        let half = Auth::Secret {
            client_id: "cid".into(),
            secret: String::new(),
        };
        assert!(validate_auth(&half, Runtime::Server).is_err());
    }

    #[test]
    fn test_empty_api_key_is_rejected() {
        assert!(validate_auth(&Auth::ApiKey(String::new()), Runtime::Browser).is_err());
    }
}
