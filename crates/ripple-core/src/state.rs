//! Finite state machines for component, channel, and connection lifecycles.
//!
//! Legal transitions are enumerated per state type, so an illegal transition
//! is an error rather than a silent flag flip. State is broadcast through a
//! `watch` channel: a subscriber always observes the current state on
//! subscription, late or not.

use crate::error::StateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::watch;
use tracing::debug;

/// A lifecycle state with an enumerable transition table.
pub trait State: Copy + Eq + Send + Sync + fmt::Debug + 'static {
    /// The state a fresh machine starts in.
    fn initial() -> Self;

    /// Whether the transition `self -> to` is legal.
    fn can_transition(self, to: Self) -> bool;

    /// Stable name for logs and errors.
    fn name(self) -> &'static str;
}

/// Lifecycle of a `RealtimeComponent`.
///
/// `Stopped` is both initial and terminal; a destroyed component is never
/// restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComponentState {
    /// Initial and terminal.
    Stopped,
    /// Reached once after a successful boot.
    Started,
}

impl State for ComponentState {
    fn initial() -> Self {
        ComponentState::Stopped
    }

    fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (ComponentState::Stopped, ComponentState::Started)
                | (ComponentState::Started, ComponentState::Stopped)
        )
    }

    fn name(self) -> &'static str {
        match self {
            ComponentState::Stopped => "STOPPED",
            ComponentState::Started => "STARTED",
        }
    }
}

/// Lifecycle of a `Channel`.
///
/// `Disconnected` is initial and terminal; `Connected` is reached at most
/// once, when the local participant's join is acknowledged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelState {
    /// Initial and terminal.
    Disconnected,
    /// Join acknowledged by the transport.
    Connected,
}

impl State for ChannelState {
    fn initial() -> Self {
        ChannelState::Disconnected
    }

    fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (ChannelState::Disconnected, ChannelState::Connected)
                | (ChannelState::Connected, ChannelState::Disconnected)
        )
    }

    fn name(self) -> &'static str {
        match self {
            ChannelState::Disconnected => "DISCONNECTED",
            ChannelState::Connected => "CONNECTED",
        }
    }
}

/// Translated connection state published by the connection manager.
///
/// The first four variants mirror the transport's own states and are
/// forwarded unchanged; the error variants are mapped from disconnect
/// reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Connecting,
    Connected,
    Reconnecting,
    Disconnected,
    /// The transport refused the credentials.
    AuthError,
    /// The same account joined the room from elsewhere.
    SameAccountError,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Connecting => "CONNECTING",
            ConnectionState::Connected => "CONNECTED",
            ConnectionState::Reconnecting => "RECONNECTING",
            ConnectionState::Disconnected => "DISCONNECTED",
            ConnectionState::AuthError => "AUTH_ERROR",
            ConnectionState::SameAccountError => "SAME_ACCOUNT_ERROR",
        };
        write!(f, "{s}")
    }
}

/// A watch-backed state machine over a [`State`] type.
#[derive(Debug)]
pub struct StateMachine<S: State> {
    tx: watch::Sender<S>,
}

impl<S: State> StateMachine<S> {
    /// Create a machine in `S::initial()`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tx: watch::Sender::new(S::initial()),
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> S {
        *self.tx.borrow()
    }

    /// Attempt the transition to `to`.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] when the transition is not in the legal table;
    /// the machine stays in its current state.
    pub fn transition(&self, to: S) -> Result<S, StateError> {
        let from = self.current();
        if !from.can_transition(to) {
            return Err(StateError {
                from: from.name(),
                to: to.name(),
            });
        }
        self.tx.send_replace(to);
        debug!(from = from.name(), to = to.name(), "State transition");
        Ok(to)
    }

    /// Subscribe to state changes. The receiver immediately observes the
    /// current state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.tx.subscribe()
    }
}

impl<S: State> Default for StateMachine<S> {
    fn default() -> Self {
        Self::new()
    }
}
