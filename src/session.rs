//! Room/file session controller — the join/leave handshake for file rooms.
//!
//! DESIGN
//! ======
//! At most one file is joined per editor view. Switching from file A to
//! file B runs a fixed protocol:
//!
//! 1. leave-broadcast for A (only while connected) and cancel A's two
//!    subscriptions,
//! 2. subscribe B's edit and auto-save topics,
//! 3. join-broadcast for B.
//!
//! Step 2 strictly precedes step 3: the broker answers a join with a
//! content-sync on the edit topic, and a client that is not yet listening
//! misses that reply.
//!
//! Inbound edit broadcasts carry the whole document, not a diff; they are
//! emitted as [`SessionEvent::RemoteEdit`]. Inbound auto-save broadcasts are
//! dropped when they carry the local username (self-echo).

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::SyncClient;
use crate::envelope::{
    AutoSaveBroadcast, EditBroadcast, EditingIndicators, Envelope, FileRoomAction, topics,
};
use crate::error::SyncError;
use crate::registry::SubscriptionId;

/// Lifecycle of the active file within a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No file joined.
    Idle,
    /// Subscriptions are being established; the join has not gone out yet.
    Joining,
    /// Joined and listening.
    Joined,
}

/// Events emitted by a [`FileSession`] toward the embedding application.
#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    /// A peer replaced the document content (last-write-wins).
    RemoteEdit { file_id: String, content: String },
    /// A peer flipped the auto-save preference for a file.
    AutoSave { file_id: String, enabled: bool },
    /// Aggregated editing activity for the room.
    Indicators(EditingIndicators),
}

struct ActiveFile {
    file_id: String,
    subs: Vec<SubscriptionId>,
}

struct SessionState {
    phase: SessionPhase,
    active: Option<ActiveFile>,
    indicators_sub: Option<SubscriptionId>,
}

/// Drives the file-room handshake for one room view.
pub struct FileSession {
    client: SyncClient,
    room_id: String,
    username: String,
    state: Mutex<SessionState>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl FileSession {
    /// Create a session for a room view. The receiver yields remote edits,
    /// auto-save changes, and indicator updates.
    #[must_use]
    pub fn new(
        client: SyncClient,
        room_id: impl Into<String>,
        username: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let session = Self {
            client,
            room_id: room_id.into(),
            username: username.into(),
            state: Mutex::new(SessionState { phase: SessionPhase::Idle, active: None, indicators_sub: None }),
            events,
        };
        (session, rx)
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.state.lock().expect("session lock").phase
    }

    /// The currently joined file, if any.
    #[must_use]
    pub fn active_file(&self) -> Option<String> {
        self.state
            .lock()
            .expect("session lock")
            .active
            .as_ref()
            .map(|active| active.file_id.clone())
    }

    /// Switch the active file, running the leave/subscribe/join protocol.
    /// Re-opening the already-active file is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] when no connection is live; the
    /// session falls back to `Idle` and the previous file stays left.
    pub fn open_file(&self, file_id: &str) -> Result<(), SyncError> {
        let mut state = self.state.lock().expect("session lock");
        if state
            .active
            .as_ref()
            .is_some_and(|active| active.file_id == file_id)
        {
            return Ok(());
        }

        self.leave_active(&mut state);
        state.phase = SessionPhase::Joining;

        match self.join(file_id) {
            Ok(subs) => {
                state.active = Some(ActiveFile { file_id: file_id.to_owned(), subs });
                state.phase = SessionPhase::Joined;
                Ok(())
            }
            Err(e) => {
                state.phase = SessionPhase::Idle;
                Err(e)
            }
        }
    }

    /// Leave the active file room. Safe to call while disconnected (the
    /// leave broadcast is best-effort) and when no file is active.
    pub fn close(&self) {
        let mut state = self.state.lock().expect("session lock");
        self.leave_active(&mut state);
        if let Some(sub) = state.indicators_sub.take() {
            self.client.unsubscribe(sub);
        }
        state.phase = SessionPhase::Idle;
    }

    /// Subscribe to the room's aggregated editing-indicator feed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn watch_indicators(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock().expect("session lock");
        if state.indicators_sub.is_some() {
            return Ok(());
        }
        let events = self.events.clone();
        let sub = self
            .client
            .subscribe(&topics::editing_indicators(&self.room_id), move |envelope| {
                match serde_json::from_value::<EditingIndicators>(envelope.body.clone()) {
                    Ok(indicators) => {
                        let _ = events.send(SessionEvent::Indicators(indicators));
                    }
                    Err(e) => warn!(error = %e, "malformed editing-indicators payload"),
                }
            })?;
        state.indicators_sub = Some(sub);
        Ok(())
    }

    /// Subscribe both per-file topics, then send the join broadcast.
    fn join(&self, file_id: &str) -> Result<Vec<SubscriptionId>, SyncError> {
        let edit_sub = {
            let events = self.events.clone();
            let file = file_id.to_owned();
            self.client
                .subscribe(&topics::file_edit(&self.room_id, file_id), move |envelope| {
                    dispatch_edit(&events, &file, envelope);
                })?
        };

        let autosave_sub = {
            let events = self.events.clone();
            let file = file_id.to_owned();
            let username = self.username.clone();
            match self
                .client
                .subscribe(&topics::file_autosave(&self.room_id, file_id), move |envelope| {
                    dispatch_autosave(&events, &file, &username, envelope);
                }) {
                Ok(sub) => sub,
                Err(e) => {
                    self.client.unsubscribe(edit_sub);
                    return Err(e);
                }
            }
        };

        let subs = vec![edit_sub, autosave_sub];
        if let Err(e) = self
            .client
            .publish_payload(topics::APP_JOIN_FILE_ROOM, &self.action(file_id))
        {
            for sub in &subs {
                self.client.unsubscribe(*sub);
            }
            return Err(e);
        }
        Ok(subs)
    }

    /// Step 1 of the switch protocol: best-effort leave broadcast for the
    /// previous file, then cancel its subscriptions.
    fn leave_active(&self, state: &mut SessionState) {
        let Some(previous) = state.active.take() else {
            return;
        };
        if self.client.is_connected() {
            if let Err(e) = self
                .client
                .publish_payload(topics::APP_LEAVE_FILE_ROOM, &self.action(&previous.file_id))
            {
                warn!(error = %e, file_id = %previous.file_id, "leave broadcast dropped");
            }
        }
        for sub in previous.subs {
            self.client.unsubscribe(sub);
        }
    }

    fn action(&self, file_id: &str) -> FileRoomAction {
        FileRoomAction {
            room_id: self.room_id.clone(),
            file_id: file_id.to_owned(),
            username: self.username.clone(),
        }
    }
}

impl Drop for FileSession {
    fn drop(&mut self) {
        self.close();
    }
}

fn dispatch_edit(events: &mpsc::UnboundedSender<SessionEvent>, file_id: &str, envelope: &Envelope) {
    match serde_json::from_value::<EditBroadcast>(envelope.body.clone()) {
        Ok(edit) => {
            let _ = events.send(SessionEvent::RemoteEdit {
                file_id: file_id.to_owned(),
                content: edit.content,
            });
        }
        Err(e) => warn!(error = %e, "malformed edit payload"),
    }
}

fn dispatch_autosave(
    events: &mpsc::UnboundedSender<SessionEvent>,
    file_id: &str,
    local_username: &str,
    envelope: &Envelope,
) {
    match serde_json::from_value::<AutoSaveBroadcast>(envelope.body.clone()) {
        Ok(broadcast) => {
            // Self-echo: our own toggle coming back must not re-apply.
            if broadcast.username == local_username {
                return;
            }
            let _ = events.send(SessionEvent::AutoSave {
                file_id: file_id.to_owned(),
                enabled: broadcast.enabled,
            });
        }
        Err(e) => warn!(error = %e, "malformed auto-save payload"),
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
