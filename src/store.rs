//! The event store façade tying all components together.
//!
//! Input flows gateway → upgrade pipeline → repository → bus + logger.
//! Everything up to and including the commit fails `emit` synchronously;
//! everything after the commit (dispatch, logging) is isolated and can
//! never roll it back.

use crate::bus::{EventBus, EventHandler, HandlerError, SubscriptionHandle};
use crate::error::{Result, StoreError};
use crate::filter::EventFilter;
use crate::logger::{Logger, VoidLogger};
use crate::repo::{InMemoryRepository, Repository};
use crate::schema::SchemaGateway;
use crate::types::{Event, Stream};
use crate::upgrade::{UpgradePipeline, Upgrader};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Builder for [`EventStore`]. Only the schema gateway is required;
/// everything else defaults (in-memory repository, empty upgrade
/// pipeline, void logger).
pub struct EventStoreBuilder {
    schema: Arc<dyn SchemaGateway>,
    repository: Option<Arc<dyn Repository>>,
    upgraders: Vec<Arc<dyn Upgrader>>,
    logger: Option<Arc<dyn Logger>>,
}

impl EventStoreBuilder {
    pub fn repository(mut self, repository: impl Repository + 'static) -> Self {
        self.repository = Some(Arc::new(repository));
        self
    }

    /// Add one upgrader to the end of the pipeline.
    pub fn upgrader(mut self, upgrader: impl Upgrader + 'static) -> Self {
        self.upgraders.push(Arc::new(upgrader));
        self
    }

    pub fn logger(mut self, logger: impl Logger + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    pub fn build(self) -> EventStore {
        EventStore {
            schema: self.schema,
            repo: self
                .repository
                .unwrap_or_else(|| Arc::new(InMemoryRepository::new())),
            pipeline: UpgradePipeline::new(self.upgraders),
            bus: EventBus::new(),
            logger: self.logger.unwrap_or_else(|| Arc::new(VoidLogger)),
            initialized: AtomicBool::new(false),
        }
    }
}

/// Single entry point consumers use: validates input, applies upgrades,
/// commits, and fans out.
pub struct EventStore {
    schema: Arc<dyn SchemaGateway>,
    repo: Arc<dyn Repository>,
    pipeline: UpgradePipeline,
    bus: EventBus,
    logger: Arc<dyn Logger>,
    initialized: AtomicBool,
}

impl EventStore {
    pub fn builder(schema: impl SchemaGateway + 'static) -> EventStoreBuilder {
        EventStoreBuilder {
            schema: Arc::new(schema),
            repository: None,
            upgraders: Vec::new(),
            logger: None,
        }
    }

    /// One-time initialization: runs both repository validation hooks.
    /// Safe to call again; the hooks are idempotent.
    pub fn init(&self) -> Result<()> {
        self.repo.validate_events_table()?;
        self.repo.validate_streams_table()?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Validate, upgrade, and commit one raw event, then notify
    /// subscribers and the logger.
    ///
    /// Validation, upgrade, and commit errors surface here; post-commit
    /// dispatch failures are routed to the logger instead.
    pub fn emit(&self, raw: Value) -> Result<Event> {
        self.ensure_initialized()?;
        let input = self.schema.parse(raw)?;
        let input = self.pipeline.apply_input(input);
        let event = self.repo.append(input)?;

        self.bus.publish(&event, self.logger.as_ref());
        self.logger.log_event(&event);
        Ok(event)
    }

    /// Emit several raw events as one all-or-nothing commit.
    pub fn emit_batch(&self, raws: Vec<Value>) -> Result<Vec<Event>> {
        self.ensure_initialized()?;
        let inputs = raws
            .into_iter()
            .map(|raw| Ok(self.pipeline.apply_input(self.schema.parse(raw)?)))
            .collect::<Result<Vec<_>>>()?;
        let events = self.repo.append_batch(inputs)?;

        for event in &events {
            self.bus.publish(event, self.logger.as_ref());
            self.logger.log_event(event);
        }
        Ok(events)
    }

    /// Replay committed history matching `filter`, upgraded to the latest
    /// shape. Each yielded item is logged best-effort. The iterator is
    /// finite; calling again re-scans current state.
    pub fn replay(&self, filter: EventFilter) -> Result<Replay<'_>> {
        self.ensure_initialized()?;
        let events = self.repo.replay(&filter)?;
        Ok(Replay {
            inner: events.into_iter(),
            pipeline: &self.pipeline,
            logger: self.logger.as_ref(),
            filter,
        })
    }

    /// Register a handler for subsequently committed matching events.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F)
    where
        F: Fn(&Event) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.bus.subscribe(filter, handler);
    }

    /// Register a bounded-channel subscription.
    pub fn subscribe_channel(&self, filter: EventFilter, buffer: usize) -> SubscriptionHandle {
        self.bus.subscribe_channel(filter, buffer)
    }

    /// Replay all currently matching history through `handler`, then
    /// register it for live events.
    ///
    /// With no concurrent append between the replay and the registration
    /// the handler misses nothing and sees nothing twice. A commit racing
    /// the boundary may be delivered twice (at-least-once); it is never
    /// dropped.
    pub fn catch_up_and_subscribe<F>(&self, filter: EventFilter, handler: F) -> Result<()>
    where
        F: Fn(&Event) -> std::result::Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.ensure_initialized()?;
        let handler: EventHandler = Arc::new(handler);

        for event in self.repo.replay(&filter)? {
            let event = self.pipeline.apply(event);
            if let Err(e) = handler(&event) {
                self.logger
                    .error(&format!("catch-up handler failed for event {}: {e}", event.id));
            }
        }
        self.bus.subscribe_handler(filter, handler);
        Ok(())
    }

    /// Every committed event in seq order, upgraded.
    pub fn all_events(&self) -> Result<Vec<Event>> {
        self.ensure_initialized()?;
        Ok(self
            .repo
            .all_events()?
            .into_iter()
            .map(|e| self.pipeline.apply(e))
            .collect())
    }

    /// The stream table: one entry per entity, ordered by id.
    pub fn all_streams(&self) -> Result<Vec<Stream>> {
        self.ensure_initialized()?;
        self.repo.all_streams()
    }

    pub fn subscriber_count(&self) -> usize {
        self.bus.subscriber_count()
    }
}

/// Lazy iterator over one replay's match set.
pub struct Replay<'a> {
    inner: std::vec::IntoIter<Event>,
    pipeline: &'a UpgradePipeline,
    logger: &'a dyn Logger,
    filter: EventFilter,
}

impl Iterator for Replay<'_> {
    type Item = Event;

    fn next(&mut self) -> Option<Event> {
        let event = self.pipeline.apply(self.inner.next()?);
        self.logger.log_replay_item(&self.filter, &event);
        Some(event)
    }
}
