//! Connection manager.
//!
//! Owns exactly one transport client per component and translates its state
//! notifications into [`ConnectionState`] values.

use ripple_core::ConnectionState;
use ripple_transport::{
    ClientOptions, ConnectionUpdate, Room, TransportClient, TransportError, TransportFactory,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Default room connection limit when the plan imposes no tighter cap.
pub const DEFAULT_CONNECTION_LIMIT: usize = 200;

/// Disconnect reason the transport reports for refused credentials.
pub const UNAUTHORIZED_REASON: &str = "Unauthorized connection";

/// Disconnect reason the transport reports when the same account joined the
/// room from elsewhere.
pub const SAME_ACCOUNT_REASON: &str = "user-already-in-room";

const STATE_CHANNEL_CAPACITY: usize = 64;

fn translate(update: &ConnectionUpdate) -> ConnectionState {
    match update.reason.as_deref() {
        Some(UNAUTHORIZED_REASON) => {
            error!("Transport refused the connection: unauthorized");
            ConnectionState::AuthError
        }
        Some(SAME_ACCOUNT_REASON) => ConnectionState::SameAccountError,
        _ => update.state,
    }
}

/// Owns the transport client and re-broadcasts translated connection states.
pub struct ConnectionManager {
    client: Arc<dyn TransportClient>,
    state_tx: broadcast::Sender<ConnectionState>,
    translator: JoinHandle<()>,
}

impl ConnectionManager {
    /// Create a transport client through `factory` and wrap it.
    ///
    /// # Errors
    ///
    /// Returns the factory's error when the client cannot be created.
    pub async fn create(
        factory: &dyn TransportFactory,
        options: ClientOptions,
    ) -> Result<Self, TransportError> {
        let client = factory.create(options).await?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing transport client.
    #[must_use]
    pub fn with_client(client: Arc<dyn TransportClient>) -> Self {
        let (state_tx, _) = broadcast::channel(STATE_CHANNEL_CAPACITY);
        let mut updates = client.updates();
        let tx = state_tx.clone();

        let translator = tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(update) => {
                        let state = translate(&update);
                        debug!(state = %state, reason = ?update.reason, "Connection state");
                        let _ = tx.send(state);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });

        Self {
            client,
            state_tx,
            translator,
        }
    }

    /// Subscribe to translated connection states.
    #[must_use]
    pub fn subscribe_state(&self) -> broadcast::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// Join (creating if needed) the named transport room.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when the join is refused.
    pub async fn create_room(
        &self,
        name: &str,
        limit: usize,
    ) -> Result<Arc<dyn Room>, TransportError> {
        self.client.connect(name, limit).await
    }

    /// Stop the state translation and destroy the transport client.
    ///
    /// # Errors
    ///
    /// Returns the transport's teardown error.
    pub async fn destroy(&self) -> Result<(), TransportError> {
        self.translator.abort();
        self.client.destroy().await
    }
}
