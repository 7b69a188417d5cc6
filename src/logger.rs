//! Observation seam: the store reports committed events, replay items, and
//! dispatch failures through this narrow interface and nothing else.

use crate::filter::EventFilter;
use crate::types::Event;

/// Telemetry sink consumed by the store. All methods are infallible and
/// best-effort; nothing the logger does can fail a commit.
pub trait Logger: Send + Sync {
    /// A new event was committed.
    fn log_event(&self, _event: &Event) {}

    /// An event was yielded from a replay.
    fn log_replay_item(&self, _filter: &EventFilter, _event: &Event) {}

    /// A post-commit failure (e.g. a subscriber handler error).
    fn error(&self, _message: &str) {}
}

impl<L: Logger + ?Sized> Logger for std::sync::Arc<L> {
    fn log_event(&self, event: &Event) {
        (**self).log_event(event)
    }

    fn log_replay_item(&self, filter: &EventFilter, event: &Event) {
        (**self).log_replay_item(filter, event)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }
}

/// Discards everything. The default sink.
#[derive(Clone, Copy, Debug, Default)]
pub struct VoidLogger;

impl Logger for VoidLogger {}

/// Emits through the `tracing` ecosystem.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn log_event(&self, event: &Event) {
        tracing::info!(
            seq = event.seq.0,
            event_type = %event.event_type,
            entity_id = event.entity_id.as_deref().unwrap_or("-"),
            "event committed"
        );
    }

    fn log_replay_item(&self, _filter: &EventFilter, event: &Event) {
        tracing::debug!(
            seq = event.seq.0,
            event_type = %event.event_type,
            "replay item"
        );
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
