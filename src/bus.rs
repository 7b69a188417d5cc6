//! Live fan-out of committed events to registered handlers.
//!
//! Handlers run in registration order, on the emitting thread, after the
//! commit is durable. A failing handler is reported to the logger and
//! never stops the fan-out or the emit. There is no unsubscribe; a
//! registration lives as long as the bus.

use crate::filter::EventFilter;
use crate::logger::Logger;
use crate::types::Event;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::sync::Arc;

/// What a handler may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Shared handler invoked for every matching committed event.
pub type EventHandler = Arc<dyn Fn(&Event) -> Result<(), HandlerError> + Send + Sync>;

struct Subscriber {
    filter: EventFilter,
    handler: EventHandler,
}

/// The subscription/dispatch bus.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for every subsequently committed event matching
    /// `filter`. Seq ranges in the filter are ignored for live dispatch.
    pub fn subscribe<F>(&self, filter: EventFilter, handler: F)
    where
        F: Fn(&Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.subscribe_handler(filter, Arc::new(handler));
    }

    pub(crate) fn subscribe_handler(&self, filter: EventFilter, handler: EventHandler) {
        self.subscribers.write().push(Subscriber { filter, handler });
    }

    /// Register a bounded-channel subscription and return the receiving
    /// handle. A full or disconnected buffer is reported through the
    /// logger at publish time; events are never silently dropped.
    pub fn subscribe_channel(&self, filter: EventFilter, buffer: usize) -> SubscriptionHandle {
        let (sender, receiver): (Sender<Event>, Receiver<Event>) = bounded(buffer);
        self.subscribe(filter, move |event| match sender.try_send(event.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err("subscription buffer full".into()),
            Err(TrySendError::Disconnected(_)) => Err("subscriber disconnected".into()),
        });
        SubscriptionHandle { receiver }
    }

    /// Invoke every matching handler in registration order. Handler
    /// failures go to `logger.error` and do not abort the remaining
    /// handlers; publish itself always completes.
    pub fn publish(&self, event: &Event, logger: &dyn Logger) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.iter() {
            if !subscriber.filter.matches_live(event) {
                continue;
            }
            if let Err(e) = (subscriber.handler)(event) {
                logger.error(&format!(
                    "handler failed for event {} ({}): {e}",
                    event.id, event.event_type
                ));
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Receiving end of a channel subscription.
pub struct SubscriptionHandle {
    receiver: Receiver<Event>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<Event, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<Event, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<Event, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
