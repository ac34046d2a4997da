//! The normalized message shape handed to application callbacks.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// A normalized inbound event.
///
/// Every transport payload is converted into this shape before reaching an
/// application callback, whether it arrived live or through history replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealtimeMessage {
    /// Event name within the channel.
    pub name: String,
    /// Transport connection the message originated from, when known.
    pub connection_id: Option<String>,
    /// Presence id of the sending participant, when known.
    pub participant_id: Option<String>,
    /// Application payload.
    pub data: serde_json::Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
}

impl RealtimeMessage {
    /// Create a message timestamped now.
    #[must_use]
    pub fn new(name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            connection_id: None,
            participant_id: None,
            data,
            timestamp: now_millis(),
        }
    }

    /// Attach the originating connection id.
    #[must_use]
    pub fn with_connection(mut self, connection_id: impl Into<String>) -> Self {
        self.connection_id = Some(connection_id.into());
        self
    }

    /// Attach the sending participant's presence id.
    #[must_use]
    pub fn with_participant(mut self, participant_id: impl Into<String>) -> Self {
        self.participant_id = Some(participant_id.into());
        self
    }

    /// Override the timestamp, used when rehydrating history entries.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_message_creation() {
        let msg = RealtimeMessage::new("cursor-move", json!({"x": 1}));
        assert_eq!(msg.name, "cursor-move");
        assert_eq!(msg.data, json!({"x": 1}));
        assert!(msg.connection_id.is_none());
        assert!(msg.participant_id.is_none());
        assert!(msg.timestamp > 0);
    }

    #[test]
    fn test_message_builders() {
        let msg = RealtimeMessage::new("ping", json!(null))
            .with_connection("conn-1")
            .with_participant("user-42")
            .with_timestamp(1_700_000_000_000);

        assert_eq!(msg.connection_id.as_deref(), Some("conn-1"));
        assert_eq!(msg.participant_id.as_deref(), Some("user-42"));
        assert_eq!(msg.timestamp, 1_700_000_000_000);
    }
}
