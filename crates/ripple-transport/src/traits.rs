//! Transport collaborator contract.
//!
//! Ripple does not own a wire protocol; it orchestrates an external
//! socket-style client offering rooms, presence, and history. These traits
//! define the interface that transport implementations must provide,
//! allowing the engine to be transport-agnostic.

use async_trait::async_trait;
use ripple_core::{ConnectionState, Environment, Participant};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The client or room was already torn down.
    #[error("Connection closed")]
    ConnectionClosed,

    /// The room refused the join (e.g. participant limit reached).
    #[error("Join refused: {0}")]
    JoinRefused(String),

    /// Failed to emit a message.
    #[error("Emit failed: {0}")]
    EmitFailed(String),

    /// A presence request failed.
    #[error("Presence request failed: {0}")]
    PresenceFailed(String),

    /// A history request failed.
    #[error("History request failed: {0}")]
    HistoryFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Options handed to a [`TransportFactory`] when a client is created.
///
/// `environment` is already normalized to `dev` or `prod`.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Validated API key.
    pub api_key: String,
    /// Normalized environment.
    pub environment: Environment,
    /// The local participant joining rooms through this client.
    pub participant: Participant,
    /// Developer secret, server-like runtimes.
    pub secret: Option<String>,
    /// Client id paired with the secret.
    pub client_id: Option<String>,
}

/// A connection-state notification from the transport.
///
/// `reason` carries the transport's disconnect reason verbatim; the
/// connection manager translates known reasons into error states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionUpdate {
    /// Raw transport state.
    pub state: ConnectionState,
    /// Disconnect reason, when the transport supplied one.
    pub reason: Option<String>,
}

/// A participant as seen through a room's presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceMember {
    /// Presence id (the participant id).
    pub id: String,
    /// Display name, when supplied.
    pub name: Option<String>,
    /// Transport connection the member joined from.
    pub connection_id: Option<String>,
    /// Last presence payload broadcast by the member.
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Kind of presence notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceEventKind {
    /// A member joined the room.
    Joined,
    /// A member left the room.
    Left,
    /// A member broadcast new presence data.
    Updated,
}

/// A presence notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub kind: PresenceEventKind,
    pub member: PresenceMember,
}

/// A message delivered on a room.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMessage {
    /// Transport-level event name.
    pub name: String,
    /// Raw payload.
    pub payload: Value,
    /// Originating connection, when known.
    pub connection_id: Option<String>,
    /// The sender's presence, when known.
    pub participant: Option<PresenceMember>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// One entry of a room's replayable history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Transport-level event name.
    pub name: String,
    /// Raw payload.
    pub payload: Value,
    /// Presence id of the sender, when known.
    pub participant_id: Option<String>,
    /// Originating connection, when known.
    pub connection_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

/// Produces transport clients.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Create a client authenticated with the given options.
    async fn create(&self, options: ClientOptions)
        -> Result<Arc<dyn TransportClient>, TransportError>;
}

/// One logical connection to the transport.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Subscribe to connection-state notifications.
    ///
    /// The current state is delivered to a new subscriber first.
    fn updates(&self) -> broadcast::Receiver<ConnectionUpdate>;

    /// Join (creating if needed) the named room.
    async fn connect(&self, room_name: &str, limit: usize)
        -> Result<Arc<dyn Room>, TransportError>;

    /// Tear the client down. Rooms created through it become unusable.
    async fn destroy(&self) -> Result<(), TransportError>;
}

/// A joined room: raw message pub/sub, presence, and history.
#[async_trait]
pub trait Room: Send + Sync {
    /// The room's name.
    fn name(&self) -> &str;

    /// Subscribe to messages delivered on this room.
    fn messages(&self) -> broadcast::Receiver<RoomMessage>;

    /// Subscribe to presence notifications for this room.
    ///
    /// The local participant's own join acknowledgement is delivered to the
    /// first subscriber.
    fn presence_events(&self) -> broadcast::Receiver<PresenceEvent>;

    /// Emit a message under a transport-level event name.
    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError>;

    /// Broadcast presence data for the local participant. No acknowledgement.
    async fn presence_update(&self, data: Value) -> Result<(), TransportError>;

    /// Fetch the current presence roster.
    async fn presence_get(&self) -> Result<Vec<PresenceMember>, TransportError>;

    /// Fetch the room's replayable history.
    async fn history(&self) -> Result<Vec<HistoryEntry>, TransportError>;

    /// Leave the room.
    async fn disconnect(&self) -> Result<(), TransportError>;
}
