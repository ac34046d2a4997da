//! In-process loopback transport.
//!
//! Clients created from one [`MemoryHub`] share named room states, so
//! messages, presence, and history loop back between them without any I/O.
//! Used by the test suites and by embedders that want the engine's behavior
//! without a network.

use crate::traits::{
    ClientOptions, ConnectionUpdate, HistoryEntry, PresenceEvent, PresenceEventKind,
    PresenceMember, Room, RoomMessage, TransportClient, TransportError, TransportFactory,
};
use async_trait::async_trait;
use dashmap::DashMap;
use ripple_core::{now_millis, ConnectionState, Participant};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::debug;

const ROOM_CHANNEL_CAPACITY: usize = 1024;

/// State shared by every client joined to one room.
struct RoomShared {
    name: String,
    messages: broadcast::Sender<RoomMessage>,
    presence: broadcast::Sender<PresenceEvent>,
    members: Mutex<Vec<PresenceMember>>,
    history: Mutex<Vec<HistoryEntry>>,
    disconnects: AtomicUsize,
}

impl RoomShared {
    fn new(name: impl Into<String>) -> Self {
        let (messages, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        let (presence, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        Self {
            name: name.into(),
            messages,
            presence,
            members: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
            disconnects: AtomicUsize::new(0),
        }
    }
}

/// A process-local transport hub.
///
/// Cloning shares the room table; pass clones wherever a
/// [`TransportFactory`] is expected.
#[derive(Clone, Default)]
pub struct MemoryHub {
    rooms: Arc<DashMap<String, Arc<RoomShared>>>,
}

impl MemoryHub {
    /// Create an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn room(&self, name: &str) -> Arc<RoomShared> {
        self.rooms
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(RoomShared::new(name)))
            .clone()
    }

    /// Number of messages ever emitted on the named room.
    ///
    /// The history log records every emit, which makes it double as an emit
    /// spy in tests.
    #[must_use]
    pub fn emit_count(&self, room_name: &str) -> usize {
        self.rooms
            .get(room_name)
            .map(|r| r.history.lock().expect("history lock poisoned").len())
            .unwrap_or(0)
    }

    /// How many times `disconnect` reached the named room.
    #[must_use]
    pub fn disconnect_count(&self, room_name: &str) -> usize {
        self.rooms
            .get(room_name)
            .map(|r| r.disconnects.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Current member count of the named room.
    #[must_use]
    pub fn member_count(&self, room_name: &str) -> usize {
        self.rooms
            .get(room_name)
            .map(|r| r.members.lock().expect("members lock poisoned").len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl TransportFactory for MemoryHub {
    async fn create(
        &self,
        options: ClientOptions,
    ) -> Result<Arc<dyn TransportClient>, TransportError> {
        Ok(MemoryClient::new(self.clone(), options.participant))
    }
}

/// A client connected to a [`MemoryHub`].
pub struct MemoryClient {
    hub: MemoryHub,
    participant: Participant,
    connection_id: String,
    updates: broadcast::Sender<ConnectionUpdate>,
    announced: AtomicBool,
    destroyed: AtomicBool,
}

impl MemoryClient {
    /// Create a client for the given hub and local participant.
    #[must_use]
    pub fn new(hub: MemoryHub, participant: Participant) -> Arc<Self> {
        let (updates, _) = broadcast::channel(ROOM_CHANNEL_CAPACITY);
        let connection_id = format!("conn_{:x}", rand::random::<u64>());
        Arc::new(Self {
            hub,
            participant,
            connection_id,
            updates,
            announced: AtomicBool::new(false),
            destroyed: AtomicBool::new(false),
        })
    }

    /// Inject a connection-state update, as the real transport would.
    pub fn push_update(&self, state: ConnectionState, reason: Option<&str>) {
        let _ = self.updates.send(ConnectionUpdate {
            state,
            reason: reason.map(str::to_string),
        });
    }

    fn local_member(&self) -> PresenceMember {
        PresenceMember {
            id: self.participant.id.clone(),
            name: self.participant.name.clone(),
            connection_id: Some(self.connection_id.clone()),
            data: Value::Null,
            timestamp: now_millis(),
        }
    }
}

#[async_trait]
impl TransportClient for MemoryClient {
    fn updates(&self) -> broadcast::Receiver<ConnectionUpdate> {
        let rx = self.updates.subscribe();
        // The first subscriber observes the established connection.
        if !self.announced.swap(true, Ordering::SeqCst) {
            let _ = self.updates.send(ConnectionUpdate {
                state: ConnectionState::Connected,
                reason: None,
            });
        }
        rx
    }

    async fn connect(
        &self,
        room_name: &str,
        limit: usize,
    ) -> Result<Arc<dyn Room>, TransportError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectionClosed);
        }

        let shared = self.hub.room(room_name);
        let member = self.local_member();
        {
            let mut members = shared.members.lock().expect("members lock poisoned");
            if members.len() >= limit {
                return Err(TransportError::JoinRefused(format!(
                    "room {room_name} is full ({limit})"
                )));
            }
            members.push(member.clone());
        }

        debug!(room = %room_name, participant = %member.id, "Joined memory room");
        Ok(Arc::new(MemoryRoom {
            shared,
            local: member,
            join_announced: AtomicBool::new(false),
            disconnected: AtomicBool::new(false),
        }))
    }

    async fn destroy(&self) -> Result<(), TransportError> {
        self.destroyed.store(true, Ordering::SeqCst);
        let _ = self.updates.send(ConnectionUpdate {
            state: ConnectionState::Disconnected,
            reason: None,
        });
        Ok(())
    }
}

/// One client's handle to a shared room.
struct MemoryRoom {
    shared: Arc<RoomShared>,
    local: PresenceMember,
    join_announced: AtomicBool,
    disconnected: AtomicBool,
}

impl MemoryRoom {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.disconnected.load(Ordering::SeqCst) {
            Err(TransportError::ConnectionClosed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Room for MemoryRoom {
    fn name(&self) -> &str {
        &self.shared.name
    }

    fn messages(&self) -> broadcast::Receiver<RoomMessage> {
        self.shared.messages.subscribe()
    }

    fn presence_events(&self) -> broadcast::Receiver<PresenceEvent> {
        let rx = self.shared.presence.subscribe();
        // The join acknowledgement goes out once a subscriber exists, so the
        // subscriber attached right after connect observes its own join.
        if !self.join_announced.swap(true, Ordering::SeqCst) {
            let _ = self.shared.presence.send(PresenceEvent {
                kind: PresenceEventKind::Joined,
                member: self.local.clone(),
            });
        }
        rx
    }

    async fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
        self.ensure_open()?;
        let timestamp = now_millis();

        self.shared
            .history
            .lock()
            .expect("history lock poisoned")
            .push(HistoryEntry {
                name: event.to_string(),
                payload: payload.clone(),
                participant_id: Some(self.local.id.clone()),
                connection_id: self.local.connection_id.clone(),
                timestamp,
            });

        let _ = self.shared.messages.send(RoomMessage {
            name: event.to_string(),
            payload,
            connection_id: self.local.connection_id.clone(),
            participant: Some(self.local.clone()),
            timestamp,
        });
        Ok(())
    }

    async fn presence_update(&self, data: Value) -> Result<(), TransportError> {
        self.ensure_open()?;
        let mut member = self.local.clone();
        member.data = data;
        member.timestamp = now_millis();

        {
            let mut members = self.shared.members.lock().expect("members lock poisoned");
            if let Some(existing) = members.iter_mut().find(|m| m.id == member.id) {
                *existing = member.clone();
            }
        }
        let _ = self.shared.presence.send(PresenceEvent {
            kind: PresenceEventKind::Updated,
            member,
        });
        Ok(())
    }

    async fn presence_get(&self) -> Result<Vec<PresenceMember>, TransportError> {
        self.ensure_open()?;
        Ok(self
            .shared
            .members
            .lock()
            .expect("members lock poisoned")
            .clone())
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, TransportError> {
        self.ensure_open()?;
        Ok(self
            .shared
            .history
            .lock()
            .expect("history lock poisoned")
            .clone())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.shared.disconnects.fetch_add(1, Ordering::SeqCst);
        self.shared
            .members
            .lock()
            .expect("members lock poisoned")
            .retain(|m| m.id != self.local.id);
        let _ = self.shared.presence.send(PresenceEvent {
            kind: PresenceEventKind::Left,
            member: self.local.clone(),
        });
        debug!(room = %self.shared.name, participant = %self.local.id, "Left memory room");
        Ok(())
    }
}
