//! Durable file-backed engine.
//!
//! Layout: a directory holding a `store.lock` file (exclusive, one process
//! at a time) and an append-only `events.log` of one JSON event per line.
//! `validate_events_table` opens the log and rebuilds the id set and seq
//! counter from a full scan; `validate_streams_table` derives the stream
//! table from the same scan. Both are idempotent and never destructive.
//!
//! Batch appends serialize every line first and issue a single write, so a
//! short write can be rolled back with `set_len` before the error
//! surfaces — the all-or-nothing contract holds on disk, not just in the
//! in-memory index.

use crate::error::{Result, StoreError};
use crate::fifo::FifoLock;
use crate::filter::EventFilter;
use crate::repo::Repository;
use crate::types::{Event, EventId, EventInput, Sequence, Stream};
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "store.lock";
const LOG_FILE: &str = "events.log";

/// Mutable handles and indexes, built by the first `validate_*` call.
struct OpenState {
    /// Held for the lifetime of the repository.
    _lock_file: File,

    /// Append handle for the log.
    log: File,

    /// Current log length, for short-write rollback.
    log_len: u64,

    /// Committed event count; the next seq is `count + 1`.
    count: u64,

    /// Ids of every committed event.
    ids: HashSet<EventId>,

    /// Stream table, derived from the scan and kept current on append.
    streams: HashMap<String, Stream>,
}

/// File-backed repository satisfying the same contract as the in-memory
/// reference engine.
pub struct FileRepository {
    path: PathBuf,
    write_lock: FifoLock,
    state: RwLock<Option<OpenState>>,
}

impl FileRepository {
    /// Point at a store directory. Nothing is opened until the
    /// `validate_*` hooks run.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: FifoLock::new(),
            state: RwLock::new(None),
        }
    }

    fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    /// Open the directory, take the process lock, and rebuild indexes from
    /// the log. No-op when already open.
    fn ensure_open(&self) -> Result<()> {
        if self.state.read().is_some() {
            return Ok(());
        }
        let mut slot = self.state.write();
        if slot.is_some() {
            return Ok(());
        }

        fs::create_dir_all(&self.path)?;

        let lock_file = File::create(self.path.join(LOCK_FILE))?;
        lock_file
            .try_lock_exclusive()
            .map_err(|_| StoreError::Locked)?;

        let log = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(self.log_path())?;
        let log_len = log.metadata()?.len();

        let mut ids = HashSet::new();
        let mut streams: HashMap<String, Stream> = HashMap::new();
        let mut count = 0u64;
        for event in Self::scan(&self.log_path())? {
            let event = event?;
            count += 1;
            if event.seq != Sequence(count) {
                return Err(StoreError::Corruption(format!(
                    "log position {count} holds seq {}",
                    event.seq
                )));
            }
            if !ids.insert(event.id.clone()) {
                return Err(StoreError::Corruption(format!(
                    "duplicate id {} in log",
                    event.id
                )));
            }
            if let Some(entity_id) = &event.entity_id {
                streams
                    .entry(entity_id.clone())
                    .and_modify(|s| s.record(&event.event_type, event.seq))
                    .or_insert_with(|| {
                        Stream::open(entity_id.clone(), &event.event_type, event.seq)
                    });
            }
        }

        *slot = Some(OpenState {
            _lock_file: lock_file,
            log,
            log_len,
            count,
            ids,
            streams,
        });
        Ok(())
    }

    /// Lazily parse the log, one event per line.
    fn scan(path: &Path) -> Result<impl Iterator<Item = Result<Event>>> {
        let reader = BufReader::new(File::open(path)?);
        Ok(reader.lines().map(|line| {
            let line = line?;
            serde_json::from_str(&line)
                .map_err(|e| StoreError::Deserialization(format!("bad log line: {e}")))
        }))
    }

    /// Validate and encode a batch against the open state without touching
    /// it. Returns the staged events and their encoded lines.
    fn stage(state: &OpenState, inputs: Vec<EventInput>) -> Result<(Vec<Event>, Vec<u8>)> {
        let mut staged_ids = HashSet::new();
        let mut staged_streams: HashMap<String, Sequence> = HashMap::new();
        let mut staged = Vec::with_capacity(inputs.len());
        let mut encoded = Vec::new();

        for (i, input) in inputs.into_iter().enumerate() {
            let next_seq = Sequence(state.count + i as u64 + 1);

            let id = input.id.clone().unwrap_or_else(EventId::generate);
            if state.ids.contains(&id) || !staged_ids.insert(id.clone()) {
                return Err(StoreError::DuplicateId(id));
            }

            if let Some(entity_id) = input.entity_id.clone() {
                let current = staged_streams.get(&entity_id).copied().or_else(|| {
                    state.streams.get(&entity_id).map(|s| s.last_event_seq)
                });
                super::check_expected(&entity_id, input.expected, current)?;
                staged_streams.insert(entity_id, next_seq);
            }

            let event = input.into_event(id, next_seq);
            encoded.extend_from_slice(&serde_json::to_vec(&event)?);
            encoded.push(b'\n');
            staged.push(event);
        }

        Ok((staged, encoded))
    }

    /// Write the staged lines, rolling the file back on a partial write.
    fn persist(state: &mut OpenState, encoded: &[u8]) -> Result<()> {
        if let Err(e) = state
            .log
            .write_all(encoded)
            .and_then(|_| state.log.flush())
            .and_then(|_| state.log.sync_data())
        {
            // Drop whatever fraction landed; the index was not advanced.
            let _ = state.log.set_len(state.log_len);
            return Err(e.into());
        }
        state.log_len += encoded.len() as u64;
        Ok(())
    }

    fn append_all(&self, inputs: Vec<EventInput>) -> Result<Vec<Event>> {
        let _guard = self.write_lock.lock();

        let mut slot = self.state.write();
        let state = slot.as_mut().ok_or(StoreError::NotInitialized)?;

        let (staged, encoded) = Self::stage(state, inputs)?;
        Self::persist(state, &encoded)?;

        for event in &staged {
            state.count += 1;
            state.ids.insert(event.id.clone());
            if let Some(entity_id) = &event.entity_id {
                state
                    .streams
                    .entry(entity_id.clone())
                    .and_modify(|s| s.record(&event.event_type, event.seq))
                    .or_insert_with(|| {
                        Stream::open(entity_id.clone(), &event.event_type, event.seq)
                    });
            }
        }
        Ok(staged)
    }

    /// Committed event count at call time. Scans are bounded by it so a
    /// concurrent append's in-flight line is never read half-written.
    fn committed_count(&self) -> Result<usize> {
        self.state
            .read()
            .as_ref()
            .map(|s| s.count as usize)
            .ok_or(StoreError::NotInitialized)
    }
}

impl Repository for FileRepository {
    fn validate_events_table(&self) -> Result<()> {
        self.ensure_open()
    }

    fn validate_streams_table(&self) -> Result<()> {
        // Streams are derived from the same scan that opens the log.
        self.ensure_open()
    }

    fn append(&self, input: EventInput) -> Result<Event> {
        Ok(self.append_all(vec![input])?.remove(0))
    }

    fn append_batch(&self, inputs: Vec<EventInput>) -> Result<Vec<Event>> {
        self.append_all(inputs)
    }

    /// Re-scans the log on every call; no cursor state is retained.
    fn replay(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let count = self.committed_count()?;
        let mut matched = Vec::new();
        for event in Self::scan(&self.log_path())?.take(count) {
            let event = event?;
            if filter.matches(&event) {
                matched.push(event);
            }
        }
        Ok(filter.arrange(matched))
    }

    fn all_events(&self) -> Result<Vec<Event>> {
        let count = self.committed_count()?;
        Self::scan(&self.log_path())?.take(count).collect()
    }

    fn all_streams(&self) -> Result<Vec<Stream>> {
        let guard = self.state.read();
        let state = guard.as_ref().ok_or(StoreError::NotInitialized)?;
        let mut streams: Vec<Stream> = state.streams.values().cloned().collect();
        streams.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(streams)
    }
}
