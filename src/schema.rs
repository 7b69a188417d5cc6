//! Event schema gateway: turns raw input into a typed, defaulted event.
//!
//! The core depends only on the [`SchemaGateway`] capability; any
//! structural-validation library can sit behind it. [`SchemaSet`] is the
//! bundled implementation: a closed set of tagged variants discriminated by
//! `type` + `version`, each with its own payload validator.

use crate::error::{Result, StoreError};
use crate::types::{EventId, EventInput, ExpectedRevision, Sequence, Timestamp};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Validation capability injected into the store.
///
/// `parse` either returns a typed, defaulted [`EventInput`] or rejects the
/// raw value with a human-readable message
/// ([`StoreError::EventRejected`]).
pub trait SchemaGateway: Send + Sync {
    fn parse(&self, raw: Value) -> Result<EventInput>;
}

/// Payload validator for one (type, version) variant.
pub type PayloadValidator =
    Box<dyn Fn(&Map<String, Value>) -> std::result::Result<(), String> + Send + Sync>;

/// A closed registry of event schemas keyed by (`type`, `version`).
///
/// Unrecognized types and malformed payloads are rejected; recognized
/// input gets defaults applied (`version` 1, `createdAt` left to commit
/// time). Any caller-supplied `seq` is ignored — positions are assigned
/// only by the engine.
#[derive(Default)]
pub struct SchemaSet {
    schemas: HashMap<(String, u32), PayloadValidator>,
}

impl SchemaSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a variant. The validator receives the payload map and
    /// reports the first problem it finds.
    pub fn define<F>(mut self, event_type: &str, version: u32, validator: F) -> Self
    where
        F: Fn(&Map<String, Value>) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        self.schemas
            .insert((event_type.to_string(), version), Box::new(validator));
        self
    }

    /// Register a variant that accepts any object payload.
    pub fn define_open(self, event_type: &str, version: u32) -> Self {
        self.define(event_type, version, |_| Ok(()))
    }

    fn reject(message: impl Into<String>) -> StoreError {
        StoreError::EventRejected(message.into())
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match object.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(SchemaSet::reject(format!(
            "field '{key}' must be a string, got {other}"
        ))),
    }
}

impl SchemaGateway for SchemaSet {
    fn parse(&self, raw: Value) -> Result<EventInput> {
        let object = match raw {
            Value::Object(object) => object,
            other => return Err(Self::reject(format!("event must be an object, got {other}"))),
        };

        let event_type = string_field(&object, "type")?
            .ok_or_else(|| Self::reject("missing required field 'type'"))?;

        let version = match object.get("version") {
            None | Some(Value::Null) => 1,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v >= 1)
                .ok_or_else(|| Self::reject("field 'version' must be a positive integer"))?,
            Some(other) => {
                return Err(Self::reject(format!(
                    "field 'version' must be a positive integer, got {other}"
                )))
            }
        };

        let validator = self
            .schemas
            .get(&(event_type.clone(), version))
            .ok_or_else(|| {
                Self::reject(format!(
                    "unrecognized event type '{event_type}' version {version}"
                ))
            })?;

        let payload = match object.get("payload") {
            Some(Value::Object(payload)) => payload.clone(),
            Some(other) => {
                return Err(Self::reject(format!(
                    "field 'payload' must be an object, got {other}"
                )))
            }
            None => return Err(Self::reject("missing required field 'payload'")),
        };

        validator(&payload)
            .map_err(|message| Self::reject(format!("invalid '{event_type}' payload: {message}")))?;

        let metadata = match object.get("metadata") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(metadata)) => metadata.clone(),
            Some(other) => {
                return Err(Self::reject(format!(
                    "field 'metadata' must be an object, got {other}"
                )))
            }
        };

        let created_at = match object.get("createdAt") {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => Some(Timestamp(n.as_i64().ok_or_else(|| {
                Self::reject("field 'createdAt' must be an integer timestamp")
            })?)),
            Some(other) => {
                return Err(Self::reject(format!(
                    "field 'createdAt' must be an integer timestamp, got {other}"
                )))
            }
        };

        // Absent: no assertion. Null: the entity must not exist yet.
        let expected = match object.get("expectedLastEntitySeq") {
            None => ExpectedRevision::Any,
            Some(Value::Null) => ExpectedRevision::NoStream,
            Some(Value::Number(n)) => {
                let seq = n.as_u64().ok_or_else(|| {
                    Self::reject("field 'expectedLastEntitySeq' must be a non-negative integer")
                })?;
                ExpectedRevision::Exact(Sequence(seq))
            }
            Some(other) => {
                return Err(Self::reject(format!(
                    "field 'expectedLastEntitySeq' must be an integer or null, got {other}"
                )))
            }
        };

        Ok(EventInput {
            id: string_field(&object, "id")?.map(EventId),
            entity_id: string_field(&object, "entityId")?,
            event_type,
            version,
            payload,
            metadata,
            created_at,
            expected,
            // Caller-supplied "seq" is deliberately not read.
        })
    }
}

/// Require a string payload field.
pub fn require_string(
    payload: &Map<String, Value>,
    key: &str,
) -> std::result::Result<(), String> {
    match payload.get(key) {
        Some(Value::String(_)) => Ok(()),
        Some(other) => Err(format!("'{key}' must be a string, got {other}")),
        None => Err(format!("missing '{key}'")),
    }
}

/// Require an integer payload field within an inclusive range.
pub fn require_int_in(
    payload: &Map<String, Value>,
    key: &str,
    min: i64,
    max: i64,
) -> std::result::Result<(), String> {
    match payload.get(key).and_then(Value::as_i64) {
        Some(v) if (min..=max).contains(&v) => Ok(()),
        Some(v) => Err(format!("'{key}' must be in {min}..={max}, got {v}")),
        None => Err(format!("missing integer '{key}'")),
    }
}
