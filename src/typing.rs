//! Typing indicator aggregation for the room-level typing channel.
//!
//! DESIGN
//! ======
//! Inbound events update a per-username `lastSeen` map: a start refreshes
//! the entry, a stop removes it, and events carrying the local username are
//! ignored outright. A sweep runs once per second independently of message
//! arrival and evicts entries older than the staleness threshold — that is
//! the only recovery path for peers that vanish without a stop event.
//!
//! `start_typing`/`stop_typing` are caller-invoked broadcasts on the room
//! typing channel. The editor's own `editing-started`/`editing-stopped`
//! pulses (see [`crate::throttle`]) are a protocol-distinct destination and
//! are not derived from or folded into this tracker.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::warn;

use crate::config::{TYPING_STALENESS, TYPING_SWEEP_INTERVAL};
use crate::connection::SyncClient;
use crate::envelope::{Envelope, TypingEvent, topics};
use crate::error::SyncError;
use crate::registry::SubscriptionId;

struct TrackerTasks {
    sub: Option<SubscriptionId>,
    sweeper: Option<JoinHandle<()>>,
}

struct TypingInner {
    client: SyncClient,
    room_id: String,
    username: String,
    users: Mutex<HashMap<String, Instant>>,
    tasks: Mutex<TrackerTasks>,
}

impl TypingInner {
    fn apply(&self, envelope: &Envelope) {
        let event: TypingEvent = match serde_json::from_value(envelope.body.clone()) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "malformed typing event");
                return;
            }
        };
        // Own events echo back from the broker; they never enter the set.
        if event.username == self.username {
            return;
        }
        let mut users = self.users.lock().expect("typing lock");
        if event.is_typing {
            users.insert(event.username, Instant::now());
        } else {
            users.remove(&event.username);
        }
    }

    fn sweep(&self) {
        let now = Instant::now();
        self.users
            .lock()
            .expect("typing lock")
            .retain(|_, seen| now.duration_since(*seen) < TYPING_STALENESS);
    }
}

/// Tracks which peers are typing in a room.
pub struct TypingTracker {
    inner: Arc<TypingInner>,
}

impl TypingTracker {
    #[must_use]
    pub fn new(client: SyncClient, room_id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(TypingInner {
                client,
                room_id: room_id.into(),
                username: username.into(),
                users: Mutex::new(HashMap::new()),
                tasks: Mutex::new(TrackerTasks { sub: None, sweeper: None }),
            }),
        }
    }

    /// Subscribe to the room typing channel and start the staleness sweep.
    /// Calling again while attached is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn attach(&self) -> Result<(), SyncError> {
        let mut tasks = self.inner.tasks.lock().expect("typing lock");
        if tasks.sub.is_some() {
            return Ok(());
        }

        let handler_inner = Arc::clone(&self.inner);
        let sub = self
            .inner
            .client
            .subscribe(&topics::typing(&self.inner.room_id), move |envelope| {
                handler_inner.apply(envelope);
            })?;
        tasks.sub = Some(sub);

        let sweep_inner = Arc::clone(&self.inner);
        tasks.sweeper = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(TYPING_SWEEP_INTERVAL).await;
                sweep_inner.sweep();
            }
        }));
        Ok(())
    }

    /// Unsubscribe, stop the sweep, and forget all entries.
    pub fn detach(&self) {
        let mut tasks = self.inner.tasks.lock().expect("typing lock");
        if let Some(sub) = tasks.sub.take() {
            self.inner.client.unsubscribe(sub);
        }
        if let Some(sweeper) = tasks.sweeper.take() {
            sweeper.abort();
        }
        self.inner.users.lock().expect("typing lock").clear();
    }

    /// Usernames currently typing, sorted for stable display.
    #[must_use]
    pub fn typing_users(&self) -> Vec<String> {
        let mut users: Vec<String> = self
            .inner
            .users
            .lock()
            .expect("typing lock")
            .keys()
            .cloned()
            .collect();
        users.sort();
        users
    }

    /// Broadcast that the local user started typing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn start_typing(&self) -> Result<(), SyncError> {
        self.broadcast(true)
    }

    /// Broadcast that the local user stopped typing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn stop_typing(&self) -> Result<(), SyncError> {
        self.broadcast(false)
    }

    fn broadcast(&self, is_typing: bool) -> Result<(), SyncError> {
        let event = TypingEvent {
            username: self.inner.username.clone(),
            is_typing,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };
        self.inner
            .client
            .publish_payload(&topics::typing_app(&self.inner.room_id), &event)
    }
}

impl Drop for TypingTracker {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
#[path = "typing_test.rs"]
mod tests;
