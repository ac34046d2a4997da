//! Component, channel, and presence error types.

use ripple_api::{ApiError, AuthError};
use ripple_core::{StateError, ValidationError};
use ripple_transport::TransportError;
use thiserror::Error;

/// Errors raised by a `RealtimeComponent`.
#[derive(Debug, Error)]
pub enum ComponentError {
    /// Synchronous input validation failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The account's plan does not allow the realtime product.
    #[error("[ripple] usage limit exceeded: realtime is not enabled for this account")]
    LimitExceeded,

    /// The API key did not validate.
    #[error("[ripple] invalid API key")]
    InvalidApiKey,

    /// The clientId/secret exchange returned no key.
    #[error("[ripple] failed to exchange the clientId/secret pair for an apiKey")]
    KeyExchangeFailed,

    /// Auth validation failed for infrastructure reasons.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// A platform API call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A transport operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A channel operation failed during connect.
    #[error(transparent)]
    Channel(#[from] ChannelError),

    /// An illegal lifecycle transition was attempted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors raised by a `Channel`.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// `fetch_history_for` was asked for an event absent from a non-empty
    /// history.
    #[error("Event {0} not found in the history")]
    EventNotFound(String),

    /// A room operation failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An illegal lifecycle transition was attempted.
    #[error(transparent)]
    State(#[from] StateError),
}

/// Errors raised by the per-channel presence facade.
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Broadcasting presence data failed.
    #[error("[ripple] failed to update presence: {0}")]
    Update(String),

    /// Fetching the presence roster failed.
    #[error("[ripple] failed to fetch presence: {0}")]
    Fetch(String),
}
