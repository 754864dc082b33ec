//! Subscription bookkeeping: destination → delivery handlers.
//!
//! Every `subscribe` call gets its own handle; two subscriptions to the same
//! destination are independent and each receives every broadcast. Removal is
//! idempotent so disposers stay safe to call after teardown.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::envelope::Envelope;

/// Opaque cancellation handle returned by `subscribe`.
pub type SubscriptionId = Uuid;

/// Delivery callback for one subscription.
pub type Handler = Arc<dyn Fn(&Envelope) + Send + Sync>;

struct Entry {
    destination: String,
    handler: Handler,
}

/// Maps live subscription handles to destinations and handlers.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<HashMap<SubscriptionId, Entry>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler and return its unique handle.
    pub fn insert(&self, destination: String, handler: Handler) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.entries
            .lock()
            .expect("registry lock")
            .insert(id, Entry { destination, handler });
        id
    }

    /// Remove one subscription, returning its destination. `None` when the
    /// handle is unknown or already removed — never an error.
    pub fn remove(&self, id: SubscriptionId) -> Option<String> {
        self.entries
            .lock()
            .expect("registry lock")
            .remove(&id)
            .map(|entry| entry.destination)
    }

    /// Deliver an envelope to every handler subscribed to its destination.
    ///
    /// Handlers run outside the registry lock, so they may subscribe or
    /// unsubscribe reentrantly. Returns how many handlers were invoked.
    pub fn dispatch(&self, envelope: &Envelope) -> usize {
        let handlers: Vec<Handler> = {
            let entries = self.entries.lock().expect("registry lock");
            entries
                .values()
                .filter(|entry| entry.destination == envelope.destination)
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };
        for handler in &handlers {
            handler(envelope);
        }
        handlers.len()
    }

    /// Remove everything, returning `(handle, destination)` pairs so the
    /// caller can emit per-subscription cleanup frames before the transport
    /// drops.
    pub fn drain(&self) -> Vec<(SubscriptionId, String)> {
        self.entries
            .lock()
            .expect("registry lock")
            .drain()
            .map(|(id, entry)| (id, entry.destination))
            .collect()
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock").len()
    }

    /// True when no subscriptions are live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod tests;
