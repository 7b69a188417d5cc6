//! Composable filter over committed events.
//!
//! All present fields are AND-combined; an absent field matches everything
//! on that dimension. The same filter shape drives one-shot replay and
//! live subscriptions.

use crate::types::{Event, Sequence, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Inclusive range over the global `seq`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeqRange {
    pub from: Option<Sequence>,
    pub to: Option<Sequence>,
}

impl SeqRange {
    pub fn since(seq: Sequence) -> Self {
        Self {
            from: Some(seq),
            to: None,
        }
    }

    pub fn between(from: Sequence, to: Sequence) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    fn contains(&self, seq: Sequence) -> bool {
        if let Some(from) = self.from {
            if seq < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if seq > to {
                return false;
            }
        }
        true
    }
}

/// Inclusive range over `created_at`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub from: Option<Timestamp>,
    pub to: Option<Timestamp>,
}

impl TimeRange {
    pub fn since(from: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: None,
        }
    }

    pub fn between(from: Timestamp, to: Timestamp) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    fn contains(&self, at: Timestamp) -> bool {
        if let Some(from) = self.from {
            if at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if at > to {
                return false;
            }
        }
        true
    }
}

/// Filter criteria for replay and subscriptions.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct EventFilter {
    /// Exact entity match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,

    /// Inclusive global seq range. Ignored for live dispatch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<SeqRange>,

    /// Set membership on the event type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_types: Option<Vec<String>>,

    /// Shallow exact-match subset of the payload, key by key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Map<String, Value>>,

    /// Inclusive `created_at` range.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<TimeRange>,

    /// Reverse the filtered, sorted sequence (not a different sort key).
    #[serde(default)]
    pub backwards: bool,

    /// Cap the result count, applied after ordering.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl EventFilter {
    /// Match everything.
    pub fn all() -> Self {
        Self::default()
    }

    /// Events for one entity.
    pub fn entity(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            ..Default::default()
        }
    }

    /// Events of the given types.
    pub fn event_types(types: Vec<String>) -> Self {
        Self {
            event_types: Some(types),
            ..Default::default()
        }
    }

    pub fn with_entity(mut self, entity_id: impl Into<String>) -> Self {
        self.entity_id = Some(entity_id.into());
        self
    }

    pub fn with_seq(mut self, range: SeqRange) -> Self {
        self.seq = Some(range);
        self
    }

    pub fn with_event_types(mut self, types: Vec<String>) -> Self {
        self.event_types = Some(types);
        self
    }

    pub fn with_payload(mut self, payload: Map<String, Value>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_created_at(mut self, range: TimeRange) -> Self {
        self.created_at = Some(range);
        self
    }

    pub fn backwards(mut self) -> Self {
        self.backwards = true;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Full match, including the seq range. Used by replay.
    pub fn matches(&self, event: &Event) -> bool {
        if let Some(ref range) = self.seq {
            if !range.contains(event.seq) {
                return false;
            }
        }
        self.matches_live(event)
    }

    /// Match for live dispatch: the seq range is not meaningful for an
    /// event that is already known, so it is skipped.
    pub fn matches_live(&self, event: &Event) -> bool {
        if let Some(ref entity_id) = self.entity_id {
            if event.entity_id.as_deref() != Some(entity_id.as_str()) {
                return false;
            }
        }
        if let Some(ref types) = self.event_types {
            if !types.iter().any(|t| t == &event.event_type) {
                return false;
            }
        }
        if let Some(ref subset) = self.payload {
            for (key, value) in subset {
                if event.payload.get(key) != Some(value) {
                    return false;
                }
            }
        }
        if let Some(ref range) = self.created_at {
            if !range.contains(event.created_at) {
                return false;
            }
        }
        true
    }

    /// Order, reverse, and cap an already-filtered set of events.
    ///
    /// Default order is ascending `created_at`, with commit order (`seq`)
    /// breaking ties; `backwards` reverses the sorted sequence and `limit`
    /// applies last.
    pub fn arrange(&self, mut events: Vec<Event>) -> Vec<Event> {
        events.sort_by_key(|e| (e.created_at, e.seq));
        if self.backwards {
            events.reverse();
        }
        if let Some(limit) = self.limit {
            events.truncate(limit);
        }
        events
    }
}
