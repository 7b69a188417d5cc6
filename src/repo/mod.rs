//! Persistence backends and the contract they satisfy.

mod file;
mod memory;

pub use file::FileRepository;
pub use memory::InMemoryRepository;

use crate::error::{Result, StoreError};
use crate::filter::EventFilter;
use crate::types::{Event, EventInput, ExpectedRevision, Sequence, Stream};

/// Contract every persistence backend must satisfy.
///
/// `append` is atomic with respect to other appends: the duplicate-id
/// check, the optimistic-concurrency check, and the `seq` assignment are
/// evaluated inside one critical section. `append_batch` is all-or-nothing
/// on every backend, not a convenience loop. Read methods return a
/// snapshot of committed state at call time; each call re-scans, so the
/// sequences are restartable and hold no server-side cursor.
pub trait Repository: Send + Sync {
    /// Idempotent initialization/health check for the event log. Never
    /// destructive over existing state.
    fn validate_events_table(&self) -> Result<()>;

    /// Idempotent initialization/health check for the stream table.
    fn validate_streams_table(&self) -> Result<()>;

    /// Assign the next global seq, update the entity's stream, and append.
    fn append(&self, input: EventInput) -> Result<Event>;

    /// Append every input or none of them.
    fn append_batch(&self, inputs: Vec<EventInput>) -> Result<Vec<Event>>;

    /// Filtered, ordered scan of committed events.
    fn replay(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    fn all_events(&self) -> Result<Vec<Event>>;

    fn all_streams(&self) -> Result<Vec<Stream>>;
}

/// Evaluate a caller's revision assertion against an entity's current
/// stream head. Shared by every backend so the conflict shape is uniform.
pub(crate) fn check_expected(
    entity_id: &str,
    expected: ExpectedRevision,
    current: Option<Sequence>,
) -> Result<()> {
    let ok = match expected {
        ExpectedRevision::Any => true,
        ExpectedRevision::NoStream => current.is_none(),
        ExpectedRevision::Exact(seq) => current == Some(seq),
    };
    if ok {
        Ok(())
    } else {
        Err(StoreError::ConcurrencyConflict {
            entity_id: entity_id.to_string(),
            expected,
            current,
        })
    }
}
