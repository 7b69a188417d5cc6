//! Core types for the event store.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Unique identifier for an event.
///
/// Caller-supplied or generated (UUID v4) at commit time. Two committed
/// events never share an id.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

impl EventId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        EventId(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        EventId(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        EventId(s)
    }
}

/// Global position in the log.
///
/// Assigned only by the engine at commit time, strictly increasing by one
/// per successful commit. The first committed event gets `Sequence(1)`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Sequence(pub u64);

impl fmt::Debug for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Seq({})", self.0)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Sequence {
    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }

    pub fn prev(self) -> Option<Self> {
        if self.0 > 0 {
            Some(Sequence(self.0 - 1))
        } else {
            None
        }
    }
}

/// Microseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Current time.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("Time went backwards");
        Timestamp(duration.as_micros() as i64)
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// The caller's assertion about an entity's current revision, checked at
/// commit time for optimistic concurrency.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ExpectedRevision {
    /// No assertion; the append always passes the concurrency check.
    #[default]
    Any,
    /// The entity must have no prior events.
    NoStream,
    /// The entity's `last_event_seq` must equal this value.
    Exact(Sequence),
}

/// A committed event. Immutable once appended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique identifier.
    pub id: EventId,

    /// Entity/stream this event belongs to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Global position, assigned by the engine at commit time.
    pub seq: Sequence,

    /// Schema discriminator.
    #[serde(rename = "type")]
    pub event_type: String,

    /// Schema version, bumped by upgraders.
    pub version: u32,

    /// Domain data, opaque to the core.
    pub payload: Map<String, Value>,

    /// Open metadata (e.g. causation id), opaque to the core.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,

    /// Commit timestamp; the default ordering key for replay.
    pub created_at: Timestamp,
}

/// Input for a new event, before the engine assigns `seq` and commits.
///
/// Carries the optimistic-concurrency expectation, which is checked at
/// commit time and never stored.
#[derive(Clone, Debug, Default)]
pub struct EventInput {
    /// Explicit id; generated when absent.
    pub id: Option<EventId>,
    pub entity_id: Option<String>,
    pub event_type: String,
    pub version: u32,
    pub payload: Map<String, Value>,
    pub metadata: Map<String, Value>,
    /// Explicit commit timestamp; defaults to now.
    pub created_at: Option<Timestamp>,
    pub expected: ExpectedRevision,
}

impl EventInput {
    /// Create an input with the given type, version 1, and empty payload.
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            version: 1,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<EventId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_created_at(mut self, at: Timestamp) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_expected(mut self, expected: ExpectedRevision) -> Self {
        self.expected = expected;
        self
    }

    /// Finalize into a committed event with the engine-assigned position.
    pub(crate) fn into_event(self, id: EventId, seq: Sequence) -> Event {
        Event {
            id,
            entity_id: self.entity_id,
            seq,
            event_type: self.event_type,
            version: self.version,
            payload: self.payload,
            metadata: self.metadata,
            created_at: self.created_at.unwrap_or_else(Timestamp::now),
        }
    }
}

/// Per-entity projection tracking the most recent event position.
///
/// Derived from the log, never independently authoritative. Created on the
/// first event for an entity, updated on every subsequent one, never
/// deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// The entity id.
    pub id: String,

    /// Event types observed for this entity (order irrelevant).
    pub event_types: BTreeSet<String>,

    /// Global seq of the entity's most recent event. Non-decreasing.
    pub last_event_seq: Sequence,
}

impl Stream {
    pub(crate) fn open(id: String, event_type: &str, seq: Sequence) -> Self {
        let mut event_types = BTreeSet::new();
        event_types.insert(event_type.to_string());
        Self {
            id,
            event_types,
            last_event_seq: seq,
        }
    }

    pub(crate) fn record(&mut self, event_type: &str, seq: Sequence) {
        self.event_types.insert(event_type.to_string());
        self.last_event_seq = seq;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sequence_navigation() {
        let seq = Sequence(5);
        assert_eq!(seq.next(), Sequence(6));
        assert_eq!(seq.prev(), Some(Sequence(4)));
        assert_eq!(Sequence(0).prev(), None);
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = EventId::generate();
        let b = EventId::generate();
        assert_ne!(a, b);
    }

    #[test]
    fn test_input_into_event_defaults_timestamp() {
        let input = EventInput::new("page-visited").with_entity("page-1");
        let event = input.into_event(EventId::from("e-1"), Sequence(1));
        assert_eq!(event.event_type, "page-visited");
        assert_eq!(event.version, 1);
        assert!(event.created_at.0 > 0);
    }

    #[test]
    fn test_stream_records_types_and_revision() {
        let mut stream = Stream::open("page-1".to_string(), "page-visited", Sequence(1));
        stream.record("broken-link", Sequence(4));
        stream.record("page-visited", Sequence(7));

        assert_eq!(stream.last_event_seq, Sequence(7));
        assert_eq!(stream.event_types.len(), 2);
    }

    #[test]
    fn test_event_serde_roundtrip() {
        let mut payload = Map::new();
        payload.insert("url".to_string(), json!("https://example.com"));

        let event = Event {
            id: EventId::from("e-1"),
            entity_id: Some("page-1".to_string()),
            seq: Sequence(3),
            event_type: "page-visited".to_string(),
            version: 2,
            payload,
            metadata: Map::new(),
            created_at: Timestamp(1_700_000_000_000_000),
        };

        let text = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(back, event);
    }
}
