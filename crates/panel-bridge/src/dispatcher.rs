//! Inbound dispatcher.
//! - dispatch: reply → correlation table, otherwise → subscribers
//! - subscribe/Subscription: ordered observer registry, independently removable
//! - run: sequential pump over an inbound channel

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::correlation::CorrelationTable;
use crate::envelope::Envelope;

type Subscriber = Arc<dyn Fn(&Envelope) + Send + Sync>;

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: Vec<(u64, Subscriber)>,
}

/// What the dispatcher did with one inbound envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Routed {
    /// Completed an outstanding request.
    Reply,
    /// Carried a correlation id with no outstanding request; dropped.
    Stale,
    /// Delivered to this many subscribers.
    Notified(usize),
    /// Notification with no subscribers; dropped.
    Unhandled,
}

#[derive(Clone)]
pub struct Dispatcher {
    table: Arc<CorrelationTable>,
    registry: Arc<Mutex<Registry>>,
}

/// Handle for one subscriber. Dropping it (or calling `unsubscribe`)
/// removes that subscriber only; `detach` keeps it for the dispatcher's lifetime.
#[must_use = "dropping a Subscription removes the subscriber"]
pub struct Subscription {
    id: Option<u64>,
    registry: Weak<Mutex<Registry>>,
}

impl Subscription {
    pub fn unsubscribe(mut self) {
        self.remove();
    }

    pub fn detach(mut self) {
        self.id = None;
    }

    fn remove(&mut self) {
        let Some(id) = self.id.take() else {
            return;
        };
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().entries.retain(|(entry, _)| *entry != id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}

impl Dispatcher {
    #[must_use]
    pub fn new(table: Arc<CorrelationTable>) -> Self {
        Self {
            table,
            registry: Arc::new(Mutex::new(Registry::default())),
        }
    }

    /// Registers a subscriber for notifications; subscribers run in subscription order.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = registry.next_id;
        registry.next_id += 1;
        registry.entries.push((id, Arc::new(subscriber)));
        Subscription {
            id: Some(id),
            registry: Arc::downgrade(&self.registry),
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().entries.len()
    }

    pub fn dispatch(&self, envelope: Envelope) -> Routed {
        if let Some(id) = envelope.correlation_id.clone() {
            let kind = envelope.kind.clone();
            if self.table.complete(&id, envelope.outcome()) {
                debug!(correlation_id = %id, kind = %kind, "reply matched");
                return Routed::Reply;
            }
            debug!(correlation_id = %id, kind = %kind, "dropping unroutable reply");
            return Routed::Stale;
        }

        // Snapshot so subscribers may (un)subscribe while being notified.
        let subscribers: Vec<Subscriber> = self
            .registry
            .lock()
            .entries
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect();
        if subscribers.is_empty() {
            warn!(kind = %envelope.kind, "no subscriber for notification");
            return Routed::Unhandled;
        }
        for subscriber in &subscribers {
            subscriber(&envelope);
        }
        Routed::Notified(subscribers.len())
    }

    /// Dispatches inbound envelopes one at a time until the channel closes,
    /// then fails every request still outstanding.
    pub async fn run(&self, mut inbound: mpsc::UnboundedReceiver<Envelope>) {
        while let Some(envelope) = inbound.recv().await {
            self.dispatch(envelope);
        }
        let dropped = self.table.close_all();
        debug!(dropped, "inbound channel closed");
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("pending", &self.table.len())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
