//! # ripple-transport
//!
//! Transport collaborator contract for the Ripple realtime data engine.
//!
//! Ripple does not reimplement a wire protocol. This crate defines the seam
//! an external socket-style transport plugs into:
//!
//! - **TransportFactory / TransportClient** - one logical connection,
//!   connection-state notifications, room creation
//! - **Room** - raw message pub/sub, presence, history, disconnect
//! - **MemoryHub** - an in-process loopback implementation for tests and
//!   embedders
//!
//! ```rust,ignore
//! use ripple_transport::{MemoryHub, TransportFactory};
//!
//! let hub = MemoryHub::new();
//! let client = hub.create(options).await?;
//! let room = client.connect("realtime:lobby", 200).await?;
//! ```

pub mod memory;
pub mod traits;

pub use memory::{MemoryClient, MemoryHub};
pub use traits::{
    ClientOptions, ConnectionUpdate, HistoryEntry, PresenceEvent, PresenceEventKind,
    PresenceMember, Room, RoomMessage, TransportClient, TransportError, TransportFactory,
};
