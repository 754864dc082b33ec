//! Presence tracking for a room.
//!
//! The roster is never merged incrementally: whenever the broker sends an
//! authoritative `presence.users` snapshot the local list is replaced
//! wholesale. `presence.event` notices are transient — they surface as
//! one-shot notifications and leave the roster untouched.
//!
//! The join broadcast is at-least-once: re-joining after a reconnect simply
//! publishes again and the broker deduplicates.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::SyncClient;
use crate::envelope::{PresenceJoin, PresenceLeave, PresenceMessage, PresenceUser, topics};
use crate::error::SyncError;
use crate::registry::SubscriptionId;

/// A transient join/left notice from the presence topic.
#[derive(Clone, Debug, PartialEq)]
pub struct PresenceNotice {
    /// `"joined"` or `"left"`.
    pub event: String,
    /// Display text supplied by the broker.
    pub message: String,
}

/// Joins a room's presence channel and mirrors its online-user roster.
pub struct PresenceTracker {
    client: SyncClient,
    room_id: String,
    user_id: String,
    name: String,
    roster: Arc<Mutex<Vec<PresenceUser>>>,
    sub: Mutex<Option<SubscriptionId>>,
    notices: mpsc::UnboundedSender<PresenceNotice>,
}

impl PresenceTracker {
    /// Tracker for one room. The receiver yields transient notices.
    #[must_use]
    pub fn new(
        client: SyncClient,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<PresenceNotice>) {
        let (notices, rx) = mpsc::unbounded_channel();
        let tracker = Self {
            client,
            room_id: room_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            roster: Arc::new(Mutex::new(Vec::new())),
            sub: Mutex::new(None),
            notices,
        };
        (tracker, rx)
    }

    /// Subscribe to the presence topic (if not already) and broadcast a join
    /// event. Call again after a reconnect or a room change; the broker
    /// deduplicates repeated joins.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn join(&self) -> Result<(), SyncError> {
        {
            // Re-establish the subscription on every join: after a
            // reconnect the old handle is gone with the drained registry.
            let mut sub = self.sub.lock().expect("presence lock");
            if let Some(old) = sub.take() {
                self.client.unsubscribe(old);
            }
            // Listen before announcing, so the snapshot our own join
            // triggers is not missed.
            *sub = Some(self.subscribe()?);
        }
        self.client.publish_payload(
            topics::APP_PRESENCE_JOIN,
            &PresenceJoin {
                room_id: self.room_id.clone(),
                user_id: self.user_id.clone(),
                name: self.name.clone(),
            },
        )
    }

    /// Broadcast a leave event (best effort while connected), unsubscribe,
    /// and forget the roster. Safe to call repeatedly.
    pub fn leave(&self) {
        if self.client.is_connected() {
            let leave = PresenceLeave { room_id: self.room_id.clone(), user_id: self.user_id.clone() };
            if let Err(e) = self.client.publish_payload(topics::APP_PRESENCE_LEAVE, &leave) {
                warn!(error = %e, "presence leave dropped");
            }
        }
        if let Some(sub) = self.sub.lock().expect("presence lock").take() {
            self.client.unsubscribe(sub);
        }
        self.roster.lock().expect("presence lock").clear();
    }

    /// Current online-user roster, as of the last authoritative snapshot.
    #[must_use]
    pub fn users(&self) -> Vec<PresenceUser> {
        self.roster.lock().expect("presence lock").clone()
    }

    fn subscribe(&self) -> Result<SubscriptionId, SyncError> {
        let notices = self.notices.clone();
        let roster = Arc::clone(&self.roster);
        self.client
            .subscribe(&topics::presence(&self.room_id), move |envelope| {
                match serde_json::from_value::<PresenceMessage>(envelope.body.clone()) {
                    // Authoritative snapshot: replace wholesale, never merge.
                    Ok(PresenceMessage::Users { users }) => {
                        *roster.lock().expect("presence lock") = users;
                    }
                    // Transient notice: surface it, leave the roster alone.
                    Ok(PresenceMessage::Event { event, message }) => {
                        let _ = notices.send(PresenceNotice { event, message });
                    }
                    Err(e) => warn!(error = %e, "malformed presence payload"),
                }
            })
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
