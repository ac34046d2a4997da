//! Multicast event fan-out.
//!
//! A [`Multicast`] fans one event out to many subscriber callbacks in
//! registration order; an [`EventRegistry`] indexes multicasts by a typed
//! event tag. Subscriptions are identified by a [`SubscriptionId`] token,
//! which is how an individual callback is later removed.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

static SUBSCRIPTION_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Token identifying one registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Allocate the next process-unique id.
    #[must_use]
    pub fn next() -> Self {
        Self(SUBSCRIPTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A subscriber callback.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// An ordered list of subscriber callbacks for one event.
pub struct Multicast<T> {
    subscribers: Vec<(SubscriptionId, Callback<T>)>,
}

impl<T> Multicast<T> {
    /// Create an empty multicast.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: Vec::new(),
        }
    }

    /// Register a callback, returning its subscription token.
    pub fn add(&mut self, callback: Callback<T>) -> SubscriptionId {
        let id = SubscriptionId::next();
        self.add_with_id(id, callback);
        id
    }

    /// Register a callback under a pre-allocated token.
    ///
    /// Used when a queued subscription is replayed and must keep the token
    /// originally handed to the caller.
    pub fn add_with_id(&mut self, id: SubscriptionId, callback: Callback<T>) {
        self.subscribers.push((id, callback));
    }

    /// Remove the callback registered under `id`.
    ///
    /// Returns `true` if a callback was removed.
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Drop all callbacks.
    pub fn clear(&mut self) {
        self.subscribers.clear();
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// Whether no callbacks are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Snapshot the callbacks in registration order.
    #[must_use]
    pub fn callbacks(&self) -> Vec<Callback<T>> {
        self.subscribers.iter().map(|(_, cb)| cb.clone()).collect()
    }

    /// Invoke every callback with `value`, in registration order.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, value: &T) -> usize {
        for (_, callback) in &self.subscribers {
            callback(value);
        }
        self.subscribers.len()
    }
}

impl<T> Default for Multicast<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Multicast<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Multicast")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

/// Multicasts indexed by a typed event tag.
///
/// Callbacks are invoked on a snapshot taken outside the map lock, so a
/// callback may re-enter the registry (subscribe, unsubscribe) without
/// deadlocking.
pub struct EventRegistry<K: Eq + Hash, T> {
    events: DashMap<K, Multicast<T>>,
}

impl<K: Eq + Hash + Clone, T> EventRegistry<K, T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: DashMap::new(),
        }
    }

    /// Register a callback for `tag`, creating the multicast lazily.
    pub fn subscribe(&self, tag: K, callback: Callback<T>) -> SubscriptionId {
        self.events.entry(tag).or_default().add(callback)
    }

    /// Register a callback for `tag` under a pre-allocated token.
    pub fn subscribe_with_id(&self, tag: K, id: SubscriptionId, callback: Callback<T>) {
        self.events.entry(tag).or_default().add_with_id(id, callback);
    }

    /// Remove every callback for `tag`.
    ///
    /// Returns `true` if the tag had any callbacks.
    pub fn unsubscribe(&self, tag: &K) -> bool {
        self.events.remove(tag).is_some()
    }

    /// Remove the callback registered under `id` for `tag`.
    pub fn unsubscribe_id(&self, tag: &K, id: SubscriptionId) -> bool {
        self.events
            .get_mut(tag)
            .map(|mut multicast| multicast.remove(id))
            .unwrap_or(false)
    }

    /// Invoke every callback registered for `tag` with `value`.
    ///
    /// Returns the number of callbacks invoked.
    pub fn publish(&self, tag: &K, value: &T) -> usize {
        let callbacks = match self.events.get(tag) {
            Some(multicast) => multicast.callbacks(),
            None => return 0,
        };
        trace!(recipients = callbacks.len(), "Multicast publish");
        for callback in &callbacks {
            callback(value);
        }
        callbacks.len()
    }

    /// Number of callbacks registered for `tag`.
    #[must_use]
    pub fn subscriber_count(&self, tag: &K) -> usize {
        self.events.get(tag).map(|m| m.len()).unwrap_or(0)
    }

    /// Drop every multicast.
    pub fn clear(&self) {
        self.events.clear();
    }
}

impl<K: Eq + Hash + Clone, T> Default for EventRegistry<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash, T> std::fmt::Debug for EventRegistry<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventRegistry")
            .field("events", &self.events.len())
            .finish()
    }
}
