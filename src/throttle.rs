//! Edit broadcast throttler — bounds outbound edit traffic and derives the
//! editor's typing pulses.
//!
//! DESIGN
//! ======
//! Every local keystroke updates the optimistic view immediately. Two
//! independent debounce timers run behind it:
//!
//! - a 100 ms trailing debounce on the content broadcast: each keystroke
//!   resets it, so continuous typing publishes at most once per quiet
//!   window and the final state always goes out once typing pauses;
//! - a 300 ms idle pulse: `editing-started` fires on the first keystroke
//!   after idle, `editing-stopped` when the idle timer survives.
//!
//! The content broadcast snapshots the document at keystroke time. Remote
//! broadcasts overwrite the view immediately (last-write-wins) and never
//! wait for a local throttle window.
//!
//! Broadcasts are best-effort: while disconnected the view still updates,
//! and nothing is queued for later.

use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::warn;

use crate::config::{EDIT_DEBOUNCE, EDITING_PULSE_IDLE};
use crate::connection::SyncClient;
use crate::envelope::{EditPublish, FileRoomAction, topics};

struct ThrottleState {
    content: String,
    is_typing: bool,
    edit_timer: Option<JoinHandle<()>>,
    pulse_timer: Option<JoinHandle<()>>,
}

struct ThrottlerInner {
    client: SyncClient,
    room_id: String,
    file_id: String,
    username: String,
    state: Mutex<ThrottleState>,
}

impl ThrottlerInner {
    fn publish_pulse(&self, destination: &str) {
        if !self.client.is_connected() {
            return;
        }
        let action = FileRoomAction {
            room_id: self.room_id.clone(),
            file_id: self.file_id.clone(),
            username: self.username.clone(),
        };
        if let Err(e) = self.client.publish_payload(destination, &action) {
            warn!(error = %e, destination, "typing pulse dropped");
        }
    }
}

/// Coalesces rapid local edits into a bounded-rate outbound stream for one
/// open file.
pub struct EditThrottler {
    inner: Arc<ThrottlerInner>,
}

impl EditThrottler {
    /// Throttler for one file, seeded with its current content.
    #[must_use]
    pub fn new(
        client: SyncClient,
        room_id: impl Into<String>,
        file_id: impl Into<String>,
        username: impl Into<String>,
        initial_content: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(ThrottlerInner {
                client,
                room_id: room_id.into(),
                file_id: file_id.into(),
                username: username.into(),
                state: Mutex::new(ThrottleState {
                    content: initial_content.into(),
                    is_typing: false,
                    edit_timer: None,
                    pulse_timer: None,
                }),
            }),
        }
    }

    /// Record a local keystroke: update the view, refresh both debounce
    /// timers, and emit `editing-started` when coming out of idle.
    pub fn on_local_edit(&self, content: &str) {
        let mut state = self.inner.state.lock().expect("throttle lock");
        state.content = content.to_owned();

        if !state.is_typing {
            state.is_typing = true;
            self.inner.publish_pulse(topics::APP_EDITING_STARTED);
        }
        if let Some(timer) = state.pulse_timer.take() {
            timer.abort();
        }
        let inner = Arc::clone(&self.inner);
        state.pulse_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(EDITING_PULSE_IDLE).await;
            let mut state = inner.state.lock().expect("throttle lock");
            state.is_typing = false;
            state.pulse_timer = None;
            drop(state);
            inner.publish_pulse(topics::APP_EDITING_STOPPED);
        }));

        if let Some(timer) = state.edit_timer.take() {
            timer.abort();
        }
        // Snapshot at keystroke time; a remote overwrite during the quiet
        // window does not change what this broadcast carries.
        let snapshot = content.to_owned();
        let inner = Arc::clone(&self.inner);
        state.edit_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(EDIT_DEBOUNCE).await;
            let mut state = inner.state.lock().expect("throttle lock");
            state.edit_timer = None;
            drop(state);
            if !inner.client.is_connected() {
                return;
            }
            let publish = EditPublish {
                room_id: inner.room_id.clone(),
                file_id: inner.file_id.clone(),
                content: snapshot,
            };
            if let Err(e) = inner.client.publish_payload(topics::APP_FILE_EDIT, &publish) {
                warn!(error = %e, "edit broadcast dropped");
            }
        }));
    }

    /// Apply a remote whole-document broadcast. The remote value wins
    /// immediately — there is no conflict window.
    pub fn apply_remote(&self, content: &str) {
        self.inner.state.lock().expect("throttle lock").content = content.to_owned();
    }

    /// Current optimistic view of the document.
    #[must_use]
    pub fn content(&self) -> String {
        self.inner.state.lock().expect("throttle lock").content.clone()
    }

    /// Whether the local user counts as actively editing right now.
    #[must_use]
    pub fn is_typing(&self) -> bool {
        self.inner.state.lock().expect("throttle lock").is_typing
    }
}

impl Drop for EditThrottler {
    fn drop(&mut self) {
        let mut state = self.inner.state.lock().expect("throttle lock");
        if let Some(timer) = state.edit_timer.take() {
            timer.abort();
        }
        if let Some(timer) = state.pulse_timer.take() {
            timer.abort();
        }
    }
}

#[cfg(test)]
#[path = "throttle_test.rs"]
mod tests;
