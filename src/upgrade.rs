//! Ordered chain of schema-version upgraders.
//!
//! An upgrader maps events it recognizes (by `type` + `version`) from
//! version N to N+1 and passes everything else through unchanged. The
//! pipeline is a left-fold over the chain, applied both at commit time
//! (what is physically stored) and at read time (events written before an
//! upgrader existed). Because an upgrader bumps the version it matches on,
//! re-applying the pipeline to an already-upgraded event is a no-op.

use crate::types::{Event, EventInput};
use serde_json::{Map, Value};
use std::sync::Arc;

/// The schema-bearing portion of an event: what upgraders transform.
///
/// Position, identity, and metadata are invariant under upgrades; only the
/// shape-discriminating fields and the payload move between versions.
#[derive(Clone, Debug, PartialEq)]
pub struct EventBody {
    pub event_type: String,
    pub version: u32,
    pub payload: Map<String, Value>,
}

/// One step in the version chain.
///
/// `downgrade` is the exact inverse of `upgrade`. The core only ever calls
/// `upgrade`; the inverse is part of the contract so every step stays
/// round-trip testable.
pub trait Upgrader: Send + Sync {
    fn upgrade(&self, body: EventBody) -> EventBody;
    fn downgrade(&self, body: EventBody) -> EventBody;
}

/// Deterministic, pure left-fold over an ordered list of upgraders.
#[derive(Clone, Default)]
pub struct UpgradePipeline {
    upgraders: Vec<Arc<dyn Upgrader>>,
}

impl UpgradePipeline {
    pub fn new(upgraders: Vec<Arc<dyn Upgrader>>) -> Self {
        Self { upgraders }
    }

    pub fn is_empty(&self) -> bool {
        self.upgraders.is_empty()
    }

    fn apply_body(&self, body: EventBody) -> EventBody {
        self.upgraders
            .iter()
            .fold(body, |upgraded, upgrader| upgrader.upgrade(upgraded))
    }

    /// Normalize a committed event to its latest shape.
    pub fn apply(&self, event: Event) -> Event {
        if self.upgraders.is_empty() {
            return event;
        }
        let body = EventBody {
            event_type: event.event_type,
            version: event.version,
            payload: event.payload,
        };
        let body = self.apply_body(body);
        Event {
            event_type: body.event_type,
            version: body.version,
            payload: body.payload,
            ..event
        }
    }

    /// Normalize a pre-commit input, so the stored shape is already the
    /// latest one.
    pub fn apply_input(&self, input: EventInput) -> EventInput {
        if self.upgraders.is_empty() {
            return input;
        }
        let body = EventBody {
            event_type: input.event_type,
            version: input.version,
            payload: input.payload,
        };
        let body = self.apply_body(body);
        EventInput {
            event_type: body.event_type,
            version: body.version,
            payload: body.payload,
            ..input
        }
    }
}
