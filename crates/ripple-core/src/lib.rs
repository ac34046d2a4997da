//! # ripple-core
//!
//! Core types, state machines, and event registries for the Ripple realtime
//! data engine.
//!
//! This crate provides the fundamental building blocks:
//!
//! - **Configuration** - per-component configuration with a dotted-path store
//! - **Participant** - identity and the shared id validation rule
//! - **RealtimeMessage** - the normalized inbound event shape
//! - **StateMachine** - enumerable lifecycle transitions over a watch channel
//! - **Multicast / EventRegistry** - typed-tag event fan-out
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │  RealtimeComponent │────▶│ StateMachine │────▶│ EventRegistry │
//! └────────────────────┘     └──────────────┘     └───────────────┘
//!           │
//!           ▼
//!    ┌───────────────┐
//!    │ Configuration │
//!    └───────────────┘
//! ```

pub mod config;
pub mod error;
pub mod message;
pub mod observer;
pub mod participant;
pub mod state;

pub use config::{ConfigStore, Configuration, Environment};
pub use error::{StateError, ValidationError};
pub use message::{now_millis, RealtimeMessage};
pub use observer::{Callback, EventRegistry, Multicast, SubscriptionId};
pub use participant::{validate_channel_name, validate_participant_id, Participant};
pub use state::{ChannelState, ComponentState, ConnectionState, State, StateMachine};
