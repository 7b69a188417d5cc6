//! Error types for the event store.

use crate::types::{EventId, ExpectedRevision, Sequence};
use thiserror::Error;

/// Main error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw input did not conform to any known event schema.
    #[error("event rejected: {0}")]
    EventRejected(String),

    /// An event with this id is already committed.
    #[error("duplicate event id: {0}")]
    DuplicateId(EventId),

    /// The caller's `expected` revision did not match the entity's current
    /// `last_event_seq`. Nothing was committed; re-read and retry.
    #[error("concurrency conflict on entity {entity_id}: expected {expected:?}, current is {current:?}")]
    ConcurrencyConflict {
        entity_id: String,
        expected: ExpectedRevision,
        current: Option<Sequence>,
    },

    /// Operation invoked before `init()`.
    #[error("store not initialized")]
    NotInitialized,

    #[error("store is locked by another process")]
    Locked,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    #[error("corruption detected: {0}")]
    Corruption(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
