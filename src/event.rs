//! Inbound game events and the order-preserving event history.
//!
//! Every frame the server pushes (other than heartbeat acknowledgments) becomes
//! a [`GameEvent`]: a kind tag plus the flat payload map exactly as received.
//! Events are appended to an [`EventQueue`] in arrival order before the reducer
//! sees them, so consumers that need the full history (a replay, a message log)
//! never miss an event even when the UI only looks at the latest state.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, Result};
use crate::protocol::PONG;

/// Raw `{type, data}` envelope as it appears on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// A server-originated notification.
///
/// Immutable once received. The payload is not validated beyond being a JSON
/// object; interpretation is left to the reducer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub kind: String,
    pub payload: Map<String, Value>,
}

impl GameEvent {
    /// Build an event from a kind and a `data` value.
    ///
    /// `null` data becomes an empty payload; any other non-object is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Decode`] if `data` is neither an object nor `null`.
    pub fn from_parts(kind: impl Into<String>, data: Value) -> Result<Self> {
        let kind = kind.into();
        let payload = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::Decode(format!(
                    "`{kind}` frame carries non-object data: {other}"
                )))
            }
        };
        Ok(Self { kind, payload })
    }

    /// Decode one inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Serialization`] for invalid JSON or a missing
    /// `type`, and [`ClientError::Decode`] for non-object `data`.
    pub fn decode(text: &str) -> Result<Self> {
        let envelope: Envelope = serde_json::from_str(text)?;
        Self::from_parts(envelope.kind, envelope.data)
    }

    /// Heartbeat acknowledgments never reach the event history.
    pub fn is_pong(&self) -> bool {
        self.kind == PONG
    }

    /// Encode back into a wire frame.
    pub fn to_frame(&self) -> Value {
        serde_json::json!({ "type": self.kind, "data": self.payload })
    }
}

/// Append-only, order-preserving buffer of every inbound [`GameEvent`].
///
/// Retention is the consumer's concern; the queue never trims itself.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<GameEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, returning its position in the history.
    pub fn push(&mut self, event: GameEvent) -> usize {
        self.events.push(event);
        self.events.len() - 1
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The most recently received event.
    pub fn latest(&self) -> Option<&GameEvent> {
        self.events.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GameEvent> {
        self.events.iter()
    }

    /// Events at positions `cursor..`, for consumers that poll incrementally.
    ///
    /// A cursor past the end yields an empty slice.
    pub fn since(&self, cursor: usize) -> &[GameEvent] {
        self.events.get(cursor..).unwrap_or_default()
    }

    pub fn as_slice(&self) -> &[GameEvent] {
        &self.events
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_regular_frame() {
        let ev = GameEvent::decode(r#"{"type":"speaker_turn","data":{"speaker_id":3}}"#).unwrap();
        assert_eq!(ev.kind, "speaker_turn");
        assert_eq!(ev.payload.get("speaker_id"), Some(&json!(3)));
        assert!(!ev.is_pong());
    }

    #[test]
    fn decode_frame_without_data() {
        let ev = GameEvent::decode(r#"{"type":"pong"}"#).unwrap();
        assert!(ev.is_pong());
        assert!(ev.payload.is_empty());

        let ev = GameEvent::decode(r#"{"type":"reset_vote","data":null}"#).unwrap();
        assert_eq!(ev.kind, "reset_vote");
        assert!(ev.payload.is_empty());
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            GameEvent::decode("not json"),
            Err(ClientError::Serialization(_))
        ));
        assert!(matches!(
            GameEvent::decode(r#"{"data":{}}"#),
            Err(ClientError::Serialization(_))
        ));
        assert!(matches!(
            GameEvent::decode(r#"{"type":"announcement","data":[1,2]}"#),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn to_frame_matches_wire_shape() {
        let ev = GameEvent::from_parts("player_voted", json!({"player_id": 2})).unwrap();
        assert_eq!(
            ev.to_frame(),
            json!({"type": "player_voted", "data": {"player_id": 2}})
        );
    }

    #[test]
    fn queue_preserves_arrival_order() {
        let mut queue = EventQueue::new();
        assert!(queue.is_empty());
        assert!(queue.latest().is_none());

        for kind in ["game_created", "role_assigned", "game_started"] {
            queue.push(GameEvent::from_parts(kind, Value::Null).unwrap());
        }

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.latest().unwrap().kind, "game_started");
        let kinds: Vec<_> = queue.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, ["game_created", "role_assigned", "game_started"]);
    }

    #[test]
    fn since_returns_tail_from_cursor() {
        let mut queue = EventQueue::new();
        let first = queue.push(GameEvent::from_parts("announcement", Value::Null).unwrap());
        let second = queue.push(GameEvent::from_parts("phase_change", Value::Null).unwrap());
        assert_eq!((first, second), (0, 1));

        assert_eq!(queue.since(0).len(), 2);
        assert_eq!(queue.since(1)[0].kind, "phase_change");
        assert!(queue.since(2).is_empty());
        assert!(queue.since(99).is_empty());
    }
}
