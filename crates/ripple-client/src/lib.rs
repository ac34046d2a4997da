//! # ripple-client
//!
//! Client orchestration for the Ripple realtime data engine.
//!
//! This crate ties the other crates into the surface applications use:
//!
//! - **RealtimeComponent** - credentials in, booted engine out
//! - **Channel** - named pub/sub with presence and replayable history
//! - **ChannelPresence** - the per-channel presence facade
//! - **ConnectionManager** - transport-state translation and room joins
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ripple_client::{Auth, ComponentOptions, RealtimeComponent, Runtime};
//!
//! let component = RealtimeComponent::new(
//!     Auth::Secret { client_id, secret },
//!     ComponentOptions { runtime: Runtime::Server, ..Default::default() },
//!     api,
//!     transport,
//! )?;
//! let channel = component.connect("lobby").await?;
//! channel.publish("cursor", serde_json::json!({ "x": 3 })).await?;
//! ```

pub mod channel;
pub mod component;
pub mod connection;
pub mod error;
pub mod presence;

pub use channel::Channel;
pub use component::{Auth, ComponentEvent, ComponentOptions, RealtimeComponent, Runtime};
pub use connection::{
    ConnectionManager, DEFAULT_CONNECTION_LIMIT, SAME_ACCOUNT_REASON, UNAUTHORIZED_REASON,
};
pub use error::{ChannelError, ComponentError, PresenceError};
pub use presence::ChannelPresence;

pub use ripple_core::{
    ChannelState, ComponentState, ConnectionState, Environment, Participant, RealtimeMessage,
    SubscriptionId,
};
