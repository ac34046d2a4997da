//! The per-name pub/sub channel.
//!
//! A channel wraps one transport room named `realtime:<name>`. Application
//! messages travel under the channel-scoped key `message:<name>` wrapped in
//! a `{name, payload}` envelope, so one room multiplexes many event names.
//!
//! Lifecycle: `DISCONNECTED` until the transport acknowledges the local
//! participant's join, `CONNECTED` exactly once after it, `DISCONNECTED`
//! again (terminally) after an explicit [`Channel::disconnect`].

use crate::connection::ConnectionManager;
use crate::error::ChannelError;
use crate::presence::ChannelPresence;
use ripple_core::{
    Callback, ChannelState, EventRegistry, Participant, RealtimeMessage, StateMachine,
    SubscriptionId,
};
use ripple_transport::{HistoryEntry, PresenceEvent, PresenceEventKind, RoomMessage, Room};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

struct QueuedSubscription {
    event: String,
    id: SubscriptionId,
    callback: Callback<RealtimeMessage>,
}

/// State shared between the channel handle and its listener tasks.
struct ChannelShared {
    name: String,
    state: StateMachine<ChannelState>,
    observers: EventRegistry<String, RealtimeMessage>,
    queued: Mutex<Vec<QueuedSubscription>>,
}

impl ChannelShared {
    /// Register the queued pairs and flip to `Connected` as one step.
    ///
    /// The queue lock is held across both: a concurrent `subscribe` either
    /// lands in the queue before the drain or observes `Connected` under the
    /// same lock and registers live, and no state observer sees `Connected`
    /// before every queued callback is registered.
    fn connect_and_replay(&self) {
        let mut queued = self.queued.lock().expect("queue lock poisoned");
        if self.state.current() != ChannelState::Disconnected {
            return;
        }
        for sub in queued.drain(..) {
            debug!(channel = %self.name, event = %sub.event, "Replaying queued subscription");
            self.observers.subscribe_with_id(sub.event, sub.id, sub.callback);
        }
        if self.state.transition(ChannelState::Connected).is_ok() {
            debug!(channel = %self.name, "Join acknowledged");
        }
    }
}

/// A named, authenticated pub/sub unit with presence and history.
pub struct Channel {
    name: String,
    message_key: String,
    room: Arc<dyn Room>,
    participant: Participant,
    presence: Arc<ChannelPresence>,
    shared: Arc<ChannelShared>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Join the transport room `realtime:<name>` and wire the listeners.
    ///
    /// The returned channel is `DISCONNECTED` until the transport
    /// acknowledges the local participant's join.
    ///
    /// # Errors
    ///
    /// Returns an error when the transport refuses the room join.
    pub async fn create(
        name: &str,
        manager: &ConnectionManager,
        participant: Participant,
        limit: usize,
    ) -> Result<Arc<Self>, ChannelError> {
        let room_name = format!("realtime:{name}");
        let message_key = format!("message:{name}");
        let room = manager.create_room(&room_name, limit).await?;

        // Receivers are taken before any await so neither the join
        // acknowledgement nor an early message can slip past the listeners.
        let presence_rx = room.presence_events();
        let messages_rx = room.messages();

        let shared = Arc::new(ChannelShared {
            name: name.to_string(),
            state: StateMachine::new(),
            observers: EventRegistry::new(),
            queued: Mutex::new(Vec::new()),
        });
        let presence = ChannelPresence::new(room.clone());

        let presence_task = tokio::spawn(presence_loop(
            presence_rx,
            shared.clone(),
            presence.clone(),
            participant.id.clone(),
        ));
        let message_task = tokio::spawn(message_loop(
            messages_rx,
            shared.clone(),
            message_key.clone(),
        ));

        debug!(channel = %name, room = %room_name, "Channel created");
        Ok(Arc::new(Self {
            name: name.to_string(),
            message_key,
            room,
            participant,
            presence,
            shared,
            tasks: Mutex::new(vec![presence_task, message_task]),
        }))
    }

    /// The channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ChannelState {
        self.shared.state.current()
    }

    /// Subscribe to lifecycle state changes.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// The local participant this channel joined as.
    #[must_use]
    pub fn local_participant(&self) -> &Participant {
        &self.participant
    }

    /// The per-channel presence facade.
    #[must_use]
    pub fn participant(&self) -> &ChannelPresence {
        &self.presence
    }

    /// Publish an event on the channel.
    ///
    /// Before `CONNECTED` the message is dropped, not queued: the call logs
    /// a warning and returns `Ok(false)`. Returns `Ok(true)` once emitted.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when the emit fails.
    pub async fn publish(&self, event: &str, data: Value) -> Result<bool, ChannelError> {
        if self.state() != ChannelState::Connected {
            warn!(channel = %self.name, event = %event, "Publish before CONNECTED; message dropped");
            return Ok(false);
        }
        self.room
            .emit(&self.message_key, json!({ "name": event, "payload": data }))
            .await?;
        Ok(true)
    }

    /// Register a callback for an event name.
    ///
    /// Until the join is acknowledged the pair is queued and replayed, in
    /// registration order, right after the transition to `CONNECTED`. The
    /// returned token stays valid across the replay.
    pub fn subscribe(&self, event: &str, callback: Callback<RealtimeMessage>) -> SubscriptionId {
        // State is read under the queue lock. The join replay drains the
        // queue and flips to Connected under the same lock, so a pair can
        // never land in an already-drained queue.
        let mut queued = self.shared.queued.lock().expect("queue lock poisoned");
        if self.state() != ChannelState::Connected {
            let id = SubscriptionId::next();
            queued.push(QueuedSubscription {
                event: event.to_string(),
                id,
                callback,
            });
            debug!(channel = %self.name, event = %event, "Subscription queued until join");
            id
        } else {
            drop(queued);
            self.shared.observers.subscribe(event.to_string(), callback)
        }
    }

    /// Remove every callback for an event name, queued or live.
    pub fn unsubscribe(&self, event: &str) -> bool {
        let mut removed = self.shared.observers.unsubscribe(&event.to_string());
        let mut queued = self.shared.queued.lock().expect("queue lock poisoned");
        let before = queued.len();
        queued.retain(|sub| sub.event != event);
        removed |= queued.len() != before;
        removed
    }

    /// Remove the single callback registered under `id`, queued or live.
    pub fn unsubscribe_id(&self, event: &str, id: SubscriptionId) -> bool {
        if self.shared.observers.unsubscribe_id(&event.to_string(), id) {
            return true;
        }
        let mut queued = self.shared.queued.lock().expect("queue lock poisoned");
        let before = queued.len();
        queued.retain(|sub| !(sub.event == event && sub.id == id));
        queued.len() != before
    }

    /// Fetch the room history grouped by event name.
    ///
    /// Before `CONNECTED`, or when the history holds no events at all, the
    /// call resolves `None`.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when the history request fails.
    pub async fn fetch_history(
        &self,
    ) -> Result<Option<HashMap<String, Vec<RealtimeMessage>>>, ChannelError> {
        if self.state() != ChannelState::Connected {
            warn!(channel = %self.name, "fetch_history before CONNECTED");
            return Ok(None);
        }
        let entries = self.room.history().await?;
        if entries.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.group_history(entries)))
    }

    /// Fetch one event's history entries.
    ///
    /// Resolves `None` before `CONNECTED` and on an empty history; a
    /// non-empty history lacking the event is an
    /// [`ChannelError::EventNotFound`] error.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::EventNotFound`] or the transport's error.
    pub async fn fetch_history_for(
        &self,
        event: &str,
    ) -> Result<Option<Vec<RealtimeMessage>>, ChannelError> {
        if self.state() != ChannelState::Connected {
            warn!(channel = %self.name, event = %event, "fetch_history before CONNECTED");
            return Ok(None);
        }
        let entries = self.room.history().await?;
        if entries.is_empty() {
            return Ok(None);
        }
        let mut grouped = self.group_history(entries);
        match grouped.remove(event) {
            Some(messages) => Ok(Some(messages)),
            None => Err(ChannelError::EventNotFound(event.to_string())),
        }
    }

    /// Disconnect the channel. Terminal; a second call is a logged no-op.
    ///
    /// # Errors
    ///
    /// Returns the transport's error when leaving the room fails.
    pub async fn disconnect(&self) -> Result<(), ChannelError> {
        if self.state() != ChannelState::Connected {
            debug!(channel = %self.name, "Channel already disconnected");
            return Ok(());
        }
        self.shared.state.transition(ChannelState::Disconnected)?;
        self.shared.observers.clear();
        self.shared
            .queued
            .lock()
            .expect("queue lock poisoned")
            .clear();
        self.presence.clear();
        for task in self.tasks.lock().expect("task lock poisoned").drain(..) {
            task.abort();
        }
        self.room.disconnect().await?;
        debug!(channel = %self.name, "Channel disconnected");
        Ok(())
    }

    fn group_history(&self, entries: Vec<HistoryEntry>) -> HashMap<String, Vec<RealtimeMessage>> {
        let mut grouped: HashMap<String, Vec<RealtimeMessage>> = HashMap::new();
        for entry in entries {
            let message = self.normalize_entry(entry);
            grouped.entry(message.name.clone()).or_default().push(message);
        }
        grouped
    }

    /// Turn a raw history entry into the normalized message shape.
    ///
    /// Entries emitted by a channel arrive under the channel-scoped key with
    /// the `{name, payload}` envelope; anything else keeps its transport
    /// event name and payload as-is.
    fn normalize_entry(&self, entry: HistoryEntry) -> RealtimeMessage {
        let (name, data) = if entry.name == self.message_key {
            match entry.payload.get("name").and_then(Value::as_str) {
                Some(inner) => (
                    inner.to_string(),
                    entry.payload.get("payload").cloned().unwrap_or(Value::Null),
                ),
                None => (entry.name, entry.payload),
            }
        } else {
            (entry.name, entry.payload)
        };

        RealtimeMessage {
            name,
            connection_id: entry.connection_id,
            participant_id: entry.participant_id,
            data,
            timestamp: entry.timestamp,
        }
    }
}

async fn presence_loop(
    mut rx: broadcast::Receiver<PresenceEvent>,
    shared: Arc<ChannelShared>,
    presence: Arc<ChannelPresence>,
    local_id: String,
) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if event.kind == PresenceEventKind::Joined && event.member.id == local_id {
                    shared.connect_and_replay();
                }
                presence.dispatch(&event);
            }
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(channel = %shared.name, skipped, "Presence stream lagged");
            }
        }
    }
}

async fn message_loop(
    mut rx: broadcast::Receiver<RoomMessage>,
    shared: Arc<ChannelShared>,
    message_key: String,
) {
    loop {
        match rx.recv().await {
            Ok(msg) if msg.name == message_key => {
                let event = match msg.payload.get("name").and_then(Value::as_str) {
                    Some(event) => event.to_string(),
                    None => {
                        warn!(channel = %shared.name, "Malformed message envelope dropped");
                        continue;
                    }
                };
                let data = msg.payload.get("payload").cloned().unwrap_or(Value::Null);

                let message = RealtimeMessage {
                    name: event.clone(),
                    connection_id: msg.connection_id,
                    participant_id: msg.participant.map(|p| p.id),
                    data,
                    timestamp: msg.timestamp,
                };
                shared.observers.publish(&event, &message);
            }
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(channel = %shared.name, skipped, "Message stream lagged");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ripple_core::now_millis;
    use ripple_transport::{
        ConnectionUpdate, PresenceMember, TransportClient, TransportError,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Room driven entirely by the test: joins, messages, and history are
    /// injected by hand.
    struct ScriptRoom {
        name: String,
        messages: broadcast::Sender<RoomMessage>,
        presence: broadcast::Sender<PresenceEvent>,
        emits: Mutex<Vec<(String, Value)>>,
        history: Mutex<Vec<HistoryEntry>>,
        disconnects: AtomicUsize,
    }

    impl ScriptRoom {
        fn new(name: &str) -> Arc<Self> {
            let (messages, _) = broadcast::channel(64);
            let (presence, _) = broadcast::channel(64);
            Arc::new(Self {
                name: name.to_string(),
                messages,
                presence,
                emits: Mutex::new(Vec::new()),
                history: Mutex::new(Vec::new()),
                disconnects: AtomicUsize::new(0),
            })
        }

        fn ack_join(&self, participant_id: &str) {
            let _ = self.presence.send(PresenceEvent {
                kind: PresenceEventKind::Joined,
                member: PresenceMember {
                    id: participant_id.to_string(),
                    name: None,
                    connection_id: Some("conn-1".into()),
                    data: Value::Null,
                    timestamp: now_millis(),
                },
            });
        }

        fn inject_message(&self, key: &str, payload: Value, sender: &str) {
            let _ = self.messages.send(RoomMessage {
                name: key.to_string(),
                payload,
                connection_id: Some("conn-2".into()),
                participant: Some(PresenceMember {
                    id: sender.to_string(),
                    name: None,
                    connection_id: Some("conn-2".into()),
                    data: Value::Null,
                    timestamp: now_millis(),
                }),
                timestamp: now_millis(),
            });
        }

        fn script_history(&self, entries: Vec<HistoryEntry>) {
            *self.history.lock().unwrap() = entries;
        }

        fn emit_count(&self) -> usize {
            self.emits.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Room for ScriptRoom {
        fn name(&self) -> &str {
            &self.name
        }

        fn messages(&self) -> broadcast::Receiver<RoomMessage> {
            self.messages.subscribe()
        }

        fn presence_events(&self) -> broadcast::Receiver<PresenceEvent> {
            self.presence.subscribe()
        }

        async fn emit(&self, event: &str, payload: Value) -> Result<(), TransportError> {
            self.emits.lock().unwrap().push((event.to_string(), payload));
            Ok(())
        }

        async fn presence_update(&self, _data: Value) -> Result<(), TransportError> {
            Ok(())
        }

        async fn presence_get(&self) -> Result<Vec<PresenceMember>, TransportError> {
            Ok(Vec::new())
        }

        async fn history(&self) -> Result<Vec<HistoryEntry>, TransportError> {
            Ok(self.history.lock().unwrap().clone())
        }

        async fn disconnect(&self) -> Result<(), TransportError> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ScriptClient {
        room: Arc<ScriptRoom>,
        updates: broadcast::Sender<ConnectionUpdate>,
    }

    #[async_trait]
    impl TransportClient for ScriptClient {
        fn updates(&self) -> broadcast::Receiver<ConnectionUpdate> {
            self.updates.subscribe()
        }

        async fn connect(
            &self,
            _room_name: &str,
            _limit: usize,
        ) -> Result<Arc<dyn Room>, TransportError> {
            Ok(self.room.clone())
        }

        async fn destroy(&self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    async fn channel_on(room: Arc<ScriptRoom>) -> Arc<Channel> {
        let (updates, _) = broadcast::channel(8);
        let manager = ConnectionManager::with_client(Arc::new(ScriptClient {
            room,
            updates,
        }));
        Channel::create(
            "chat",
            &manager,
            Participant::new("user-1", None).unwrap(),
            200,
        )
        .await
        .unwrap()
    }

    async fn wait_connected(channel: &Channel) {
        let mut rx = channel.subscribe_state();
        rx.wait_for(|s| *s == ChannelState::Connected).await.unwrap();
    }

    fn entry(name: &str, payload: Value, timestamp: u64) -> HistoryEntry {
        HistoryEntry {
            name: name.to_string(),
            payload,
            participant_id: Some("user-2".into()),
            connection_id: Some("conn-2".into()),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_publish_before_connected_never_reaches_transport() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;

        assert_eq!(channel.state(), ChannelState::Disconnected);
        assert!(!channel.publish("ev", json!(1)).await.unwrap());
        assert_eq!(room.emit_count(), 0);
    }

    #[tokio::test]
    async fn test_join_ack_flips_state_once() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;

        // A foreign participant's join is not ours.
        room.ack_join("someone-else");
        tokio::task::yield_now().await;
        assert_eq!(channel.state(), ChannelState::Disconnected);

        room.ack_join("user-1");
        wait_connected(&channel).await;

        assert!(channel.publish("ev", json!(1)).await.unwrap());
        assert_eq!(room.emit_count(), 1);
    }

    #[tokio::test]
    async fn test_publish_wraps_envelope_under_channel_key() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        channel.publish("cursor", json!({"x": 3})).await.unwrap();

        let emits = room.emits.lock().unwrap();
        assert_eq!(emits[0].0, "message:chat");
        assert_eq!(emits[0].1, json!({"name": "cursor", "payload": {"x": 3}}));
    }

    #[tokio::test]
    async fn test_queued_subscriptions_replay_in_order_exactly_once() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second", "third"] {
            let order = order.clone();
            channel.subscribe(
                "ev",
                Arc::new(move |_msg| order.lock().unwrap().push(label)),
            );
        }

        room.ack_join("user-1");
        wait_connected(&channel).await;

        room.inject_message(
            "message:chat",
            json!({"name": "ev", "payload": 1}),
            "user-2",
        );
        tokio::task::yield_now().await;

        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_inbound_message_is_normalized() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        channel.subscribe(
            "cursor",
            Arc::new(move |msg: &RealtimeMessage| sink.lock().unwrap().push(msg.clone())),
        );

        room.inject_message(
            "message:chat",
            json!({"name": "cursor", "payload": {"x": 9}}),
            "user-2",
        );
        // Messages on other rooms' keys never reach this channel.
        room.inject_message(
            "message:other",
            json!({"name": "cursor", "payload": {"x": 1}}),
            "user-2",
        );
        tokio::task::yield_now().await;

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].name, "cursor");
        assert_eq!(received[0].data, json!({"x": 9}));
        assert_eq!(received[0].participant_id.as_deref(), Some("user-2"));
    }

    #[tokio::test]
    async fn test_unsubscribe_all_and_single() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        let hits = Arc::new(Mutex::new(0));
        let a_hits = hits.clone();
        let a = channel.subscribe("ev", Arc::new(move |_| *a_hits.lock().unwrap() += 1));
        let b_hits = hits.clone();
        let _b = channel.subscribe("ev", Arc::new(move |_| *b_hits.lock().unwrap() += 1));

        assert!(channel.unsubscribe_id("ev", a));
        room.inject_message("message:chat", json!({"name": "ev", "payload": null}), "user-2");
        tokio::task::yield_now().await;
        assert_eq!(*hits.lock().unwrap(), 1);

        assert!(channel.unsubscribe("ev"));
        room.inject_message("message:chat", json!({"name": "ev", "payload": null}), "user-2");
        tokio::task::yield_now().await;
        assert_eq!(*hits.lock().unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_subscribe_racing_join_ack_never_loses_the_callback() {
        for _ in 0..64 {
            let room = ScriptRoom::new("realtime:chat");
            let channel = channel_on(room.clone()).await;
            let hits = Arc::new(Mutex::new(0usize));

            // Register from another worker while the join ack lands.
            let counter = hits.clone();
            let racer = {
                let channel = channel.clone();
                tokio::spawn(async move {
                    channel.subscribe("ev", Arc::new(move |_| *counter.lock().unwrap() += 1));
                })
            };
            room.ack_join("user-1");
            racer.await.unwrap();
            wait_connected(&channel).await;

            room.inject_message(
                "message:chat",
                json!({"name": "ev", "payload": null}),
                "user-2",
            );
            for _ in 0..200 {
                if *hits.lock().unwrap() == 1 {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            assert_eq!(*hits.lock().unwrap(), 1, "raced subscription missed the message");
            assert!(channel.shared.queued.lock().unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_debug_renders_name_and_state() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room).await;
        let rendered = format!("{channel:?}");
        assert!(rendered.contains("chat"));
        assert!(rendered.contains("Disconnected"));
    }

    #[tokio::test]
    async fn test_unsubscribe_removes_queued_pairs_too() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;

        let hits = Arc::new(Mutex::new(0));
        let counter = hits.clone();
        let id = channel.subscribe("ev", Arc::new(move |_| *counter.lock().unwrap() += 1));
        assert!(channel.unsubscribe_id("ev", id));

        room.ack_join("user-1");
        wait_connected(&channel).await;
        room.inject_message("message:chat", json!({"name": "ev", "payload": null}), "user-2");
        tokio::task::yield_now().await;
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_history_groups_by_event() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        room.script_history(vec![
            entry("a", json!("x"), 10),
            entry("b", json!("y"), 20),
            entry("a", json!("z"), 30),
        ]);

        let grouped = channel.fetch_history().await.unwrap().unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["a"].len(), 2);
        assert_eq!(grouped["a"][0].data, json!("x"));
        assert_eq!(grouped["a"][0].timestamp, 10);
        assert_eq!(grouped["a"][1].data, json!("z"));
        assert_eq!(grouped["b"][0].data, json!("y"));

        let only_a = channel.fetch_history_for("a").await.unwrap().unwrap();
        assert_eq!(only_a.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_history_missing_event_rejects() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;
        room.script_history(vec![entry("a", json!("x"), 10)]);

        let err = channel.fetch_history_for("missing").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Event missing not found in the history"
        );
    }

    #[tokio::test]
    async fn test_fetch_history_empty_resolves_none() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        assert!(channel.fetch_history().await.unwrap().is_none());
        // Empty history with an explicit event also resolves None; the
        // not-found rejection needs a non-empty history.
        assert!(channel.fetch_history_for("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_fetch_history_before_connected_resolves_none() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.script_history(vec![entry("a", json!("x"), 10)]);

        assert!(channel.fetch_history().await.unwrap().is_none());
        assert!(channel.fetch_history_for("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_history_unwraps_own_envelopes() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        room.script_history(vec![entry(
            "message:chat",
            json!({"name": "cursor", "payload": {"x": 2}}),
            40,
        )]);

        let grouped = channel.fetch_history().await.unwrap().unwrap();
        assert_eq!(grouped["cursor"][0].data, json!({"x": 2}));
    }

    #[tokio::test]
    async fn test_disconnect_twice_hits_transport_once() {
        let room = ScriptRoom::new("realtime:chat");
        let channel = channel_on(room.clone()).await;
        room.ack_join("user-1");
        wait_connected(&channel).await;

        channel.disconnect().await.unwrap();
        channel.disconnect().await.unwrap();

        assert_eq!(room.disconnects.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ChannelState::Disconnected);
    }
}
