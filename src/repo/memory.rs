//! Reference in-memory engine.
//!
//! The append path — duplicate-id check, optimistic-concurrency check,
//! seq assignment, stream upsert, log push — runs inside one FIFO-locked
//! critical section, so concurrent appends serialize in arrival order and
//! `seq` values are gapless. Reads clone a snapshot under short read
//! guards and never touch the write lock.

use crate::error::{Result, StoreError};
use crate::fifo::FifoLock;
use crate::filter::EventFilter;
use crate::repo::Repository;
use crate::types::{Event, EventId, EventInput, Sequence, Stream};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

/// The reference Event Store Engine.
#[derive(Default)]
pub struct InMemoryRepository {
    /// Serializes the whole append path.
    write_lock: FifoLock,

    /// The committed log, in seq order. `events[i].seq == i + 1`.
    events: RwLock<Vec<Event>>,

    /// Ids of every committed event.
    ids: RwLock<HashSet<EventId>>,

    /// Stream table, one entry per distinct entity id seen.
    streams: RwLock<HashMap<String, Stream>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage one input into a committed event. Caller holds the write
    /// lock; `staged_ids` and `staged_streams` carry earlier batch members
    /// so intra-batch conflicts fail the same way cross-batch ones do.
    fn stage(
        &self,
        input: EventInput,
        next_seq: Sequence,
        staged_ids: &mut HashSet<EventId>,
        staged_streams: &mut HashMap<String, Sequence>,
    ) -> Result<Event> {
        let id = input.id.clone().unwrap_or_else(EventId::generate);
        if self.ids.read().contains(&id) || !staged_ids.insert(id.clone()) {
            return Err(StoreError::DuplicateId(id));
        }

        if let Some(entity_id) = input.entity_id.clone() {
            let current = staged_streams.get(&entity_id).copied().or_else(|| {
                self.streams
                    .read()
                    .get(&entity_id)
                    .map(|s| s.last_event_seq)
            });
            super::check_expected(&entity_id, input.expected, current)?;
            staged_streams.insert(entity_id, next_seq);
        }

        Ok(input.into_event(id, next_seq))
    }

    /// Apply staged events to the log and stream table. Infallible; all
    /// checks already passed.
    fn commit(&self, staged: Vec<Event>) -> Vec<Event> {
        let mut events = self.events.write();
        let mut ids = self.ids.write();
        let mut streams = self.streams.write();

        for event in &staged {
            ids.insert(event.id.clone());
            if let Some(entity_id) = &event.entity_id {
                streams
                    .entry(entity_id.clone())
                    .and_modify(|s| s.record(&event.event_type, event.seq))
                    .or_insert_with(|| {
                        Stream::open(entity_id.clone(), &event.event_type, event.seq)
                    });
            }
            events.push(event.clone());
        }
        staged
    }
}

impl Repository for InMemoryRepository {
    /// No-op over existing state; the log lives in memory from construction.
    fn validate_events_table(&self) -> Result<()> {
        Ok(())
    }

    fn validate_streams_table(&self) -> Result<()> {
        Ok(())
    }

    fn append(&self, input: EventInput) -> Result<Event> {
        let _guard = self.write_lock.lock();

        let next_seq = Sequence(self.events.read().len() as u64 + 1);
        let mut staged_ids = HashSet::new();
        let mut staged_streams = HashMap::new();
        let event = self.stage(input, next_seq, &mut staged_ids, &mut staged_streams)?;

        Ok(self.commit(vec![event]).remove(0))
    }

    fn append_batch(&self, inputs: Vec<EventInput>) -> Result<Vec<Event>> {
        let _guard = self.write_lock.lock();

        let base = self.events.read().len() as u64;
        let mut staged_ids = HashSet::new();
        let mut staged_streams = HashMap::new();
        let mut staged = Vec::with_capacity(inputs.len());

        // Validate and stage everything before touching committed state.
        for (i, input) in inputs.into_iter().enumerate() {
            let next_seq = Sequence(base + i as u64 + 1);
            staged.push(self.stage(input, next_seq, &mut staged_ids, &mut staged_streams)?);
        }

        Ok(self.commit(staged))
    }

    fn replay(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let matched: Vec<Event> = self
            .events
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        Ok(filter.arrange(matched))
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        Ok(self.events.read().clone())
    }

    fn all_streams(&self) -> Result<Vec<Stream>> {
        let mut streams: Vec<Stream> = self.streams.read().values().cloned().collect();
        streams.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(streams)
    }
}
