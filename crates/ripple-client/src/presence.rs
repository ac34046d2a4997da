//! Per-channel presence facade.

use crate::error::PresenceError;
use ripple_core::{Callback, EventRegistry, SubscriptionId};
use ripple_transport::{PresenceEvent, PresenceEventKind, PresenceMember, Room};
use serde_json::Value;
use std::sync::Arc;

/// Thin pass-through over a room's presence primitive.
///
/// Presence events are dispatched into the facade by the owning channel's
/// presence listener; the facade itself never subscribes to the room, so the
/// channel stays the room's single presence subscriber.
pub struct ChannelPresence {
    room: Arc<dyn Room>,
    registry: EventRegistry<PresenceEventKind, PresenceEvent>,
}

impl ChannelPresence {
    pub(crate) fn new(room: Arc<dyn Room>) -> Arc<Self> {
        Arc::new(Self {
            room,
            registry: EventRegistry::new(),
        })
    }

    /// Broadcast presence data for the local participant. No acknowledgement.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Update`] on transport failure.
    pub async fn update(&self, data: Value) -> Result<(), PresenceError> {
        self.room
            .presence_update(data)
            .await
            .map_err(|e| PresenceError::Update(e.to_string()))
    }

    /// Register a callback for one presence event kind.
    pub fn subscribe(
        &self,
        kind: PresenceEventKind,
        callback: Callback<PresenceEvent>,
    ) -> SubscriptionId {
        self.registry.subscribe(kind, callback)
    }

    /// Remove every callback for one presence event kind.
    pub fn unsubscribe(&self, kind: PresenceEventKind) -> bool {
        self.registry.unsubscribe(&kind)
    }

    /// Remove the callback registered under `id`.
    pub fn unsubscribe_id(&self, kind: PresenceEventKind, id: SubscriptionId) -> bool {
        self.registry.unsubscribe_id(&kind, id)
    }

    /// Fetch the room's current presence roster.
    ///
    /// # Errors
    ///
    /// Returns [`PresenceError::Fetch`] on transport failure.
    pub async fn get_all(&self) -> Result<Vec<PresenceMember>, PresenceError> {
        self.room
            .presence_get()
            .await
            .map_err(|e| PresenceError::Fetch(e.to_string()))
    }

    pub(crate) fn dispatch(&self, event: &PresenceEvent) {
        self.registry.publish(&event.kind, event);
    }

    pub(crate) fn clear(&self) {
        self.registry.clear();
    }
}
