//! # Sequent
//!
//! An embeddable event-sourcing core: callers submit typed events, the
//! engine assigns each a durable position in an append-only log, tracks a
//! per-entity revision for optimistic concurrency, and lets consumers
//! replay or subscribe to filtered subsets of the log with schema-version
//! upgrading applied transparently.
//!
//! ## Core Concepts
//!
//! - **Events**: Immutable log entries with a global `seq`, typed payload,
//!   and schema version
//! - **Streams**: Per-entity revision tracking for optimistic concurrency
//! - **Replay**: Filtered, ordered reads over committed history
//! - **Subscriptions**: Live fan-out plus catch-up-then-subscribe
//! - **Upgraders**: Deterministic normalization to the latest event shape
//!
//! ## Example
//!
//! ```ignore
//! use sequent::{EventFilter, EventStore, SchemaSet};
//! use serde_json::json;
//!
//! let store = EventStore::builder(
//!     SchemaSet::new().define_open("page-visited", 1),
//! )
//! .build();
//! store.init()?;
//!
//! store.emit(json!({
//!     "type": "page-visited",
//!     "entityId": "page-1",
//!     "payload": { "url": "https://example.com" },
//! }))?;
//!
//! for event in store.replay(EventFilter::entity("page-1"))? {
//!     println!("{} at {:?}", event.event_type, event.seq);
//! }
//! ```

pub mod bus;
pub mod error;
pub mod fifo;
pub mod filter;
pub mod logger;
pub mod repo;
pub mod schema;
pub mod snapshot;
pub mod store;
pub mod types;
pub mod upgrade;

// Re-exports
pub use bus::{EventBus, EventHandler, HandlerError, SubscriptionHandle};
pub use error::{Result, StoreError};
pub use fifo::{FifoGuard, FifoLock};
pub use filter::{EventFilter, SeqRange, TimeRange};
pub use logger::{Logger, TracingLogger, VoidLogger};
pub use repo::{FileRepository, InMemoryRepository, Repository};
pub use schema::{SchemaGateway, SchemaSet};
pub use snapshot::{InMemorySnapshotStore, SnapshotStore};
pub use store::{EventStore, EventStoreBuilder, Replay};
pub use types::{Event, EventId, EventInput, ExpectedRevision, Sequence, Stream, Timestamp};
pub use upgrade::{EventBody, UpgradePipeline, Upgrader};
