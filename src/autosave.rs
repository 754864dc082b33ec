//! Auto-save scheduler for one open file.
//!
//! DESIGN
//! ======
//! Auto-save is a per-room shared toggle, not a per-user preference: when
//! anyone flips it, everyone editing that file follows. A local flip
//! broadcasts the new state on the auto-save topic; a remote flip arrives
//! through the session and is applied with [`AutoSaver::sync_remote`],
//! which never re-broadcasts.
//!
//! While enabled, a 10 second interval compares the live document against
//! the last persisted snapshot and writes through the files API only when
//! they differ. A successful write (interval or manual) becomes the new
//! snapshot, so an unchanged document never generates HTTP traffic.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::AUTO_SAVE_INTERVAL;
use crate::connection::SyncClient;
use crate::envelope::{AutoSavePublish, topics};
use crate::error::ApiError;
use crate::throttle::EditThrottler;

/// Write-through seam the saver persists documents with. [`ApiClient`]
/// is the production implementation.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn persist(&self, file_id: &str, content: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl ContentStore for ApiClient {
    async fn persist(&self, file_id: &str, content: &str) -> Result<(), ApiError> {
        self.update_content(file_id, content).await?;
        Ok(())
    }
}

struct AutoSaveState {
    enabled: bool,
    last_saved: String,
    saver: Option<JoinHandle<()>>,
}

struct AutoSaveInner {
    client: SyncClient,
    store: Arc<dyn ContentStore>,
    throttler: Arc<EditThrottler>,
    room_id: String,
    file_id: String,
    username: String,
    state: Mutex<AutoSaveState>,
}

impl AutoSaveInner {
    async fn save_if_dirty(&self) {
        let content = self.throttler.content();
        {
            let state = self.state.lock().expect("autosave lock");
            if content == state.last_saved {
                return;
            }
        }
        match self.store.persist(&self.file_id, &content).await {
            Ok(_) => {
                self.state.lock().expect("autosave lock").last_saved = content;
                debug!(file_id = %self.file_id, "auto-saved");
            }
            Err(e) => warn!(error = %e, file_id = %self.file_id, "auto-save failed"),
        }
    }
}

/// Drives periodic persistence of one file and keeps the shared
/// auto-save toggle in step across the room.
pub struct AutoSaver {
    inner: Arc<AutoSaveInner>,
}

impl AutoSaver {
    /// Auto-saver for one file, starting disabled. `saved_content` is the
    /// content as last persisted, used as the dirty-check baseline.
    #[must_use]
    pub fn new(
        client: SyncClient,
        store: Arc<dyn ContentStore>,
        throttler: Arc<EditThrottler>,
        room_id: impl Into<String>,
        file_id: impl Into<String>,
        username: impl Into<String>,
        saved_content: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(AutoSaveInner {
                client,
                store,
                throttler,
                room_id: room_id.into(),
                file_id: file_id.into(),
                username: username.into(),
                state: Mutex::new(AutoSaveState {
                    enabled: false,
                    last_saved: saved_content.into(),
                    saver: None,
                }),
            }),
        }
    }

    /// Flip the toggle locally and broadcast the new state to the room.
    ///
    /// The broadcast is best-effort: while disconnected the local
    /// interval still starts or stops, and nothing is queued.
    pub fn set_enabled(&self, enabled: bool) {
        if !self.apply(enabled) {
            return;
        }
        if !self.inner.client.is_connected() {
            return;
        }
        let publish = AutoSavePublish {
            room_id: self.inner.room_id.clone(),
            file_id: self.inner.file_id.clone(),
            enabled,
            username: self.inner.username.clone(),
        };
        if let Err(e) = self
            .inner
            .client
            .publish_payload(topics::APP_AUTO_SAVE_TOGGLE, &publish)
        {
            warn!(error = %e, "auto-save toggle broadcast dropped");
        }
    }

    /// Apply a toggle received from another user without re-broadcasting.
    pub fn sync_remote(&self, enabled: bool) {
        self.apply(enabled);
    }

    /// Whether the interval is currently running.
    #[must_use]
    pub fn enabled(&self) -> bool {
        self.inner.state.lock().expect("autosave lock").enabled
    }

    /// Persist the current document immediately, regardless of the
    /// toggle. A clean document is still written.
    ///
    /// # Errors
    ///
    /// Returns the files API error when the write fails; the dirty-check
    /// baseline is only advanced on success.
    pub async fn save(&self) -> Result<(), ApiError> {
        let content = self.inner.throttler.content();
        self.inner.store.persist(&self.inner.file_id, &content).await?;
        self.inner.state.lock().expect("autosave lock").last_saved = content;
        Ok(())
    }

    /// Returns false when the toggle already had that value.
    fn apply(&self, enabled: bool) -> bool {
        let mut state = self.inner.state.lock().expect("autosave lock");
        if state.enabled == enabled {
            return false;
        }
        state.enabled = enabled;
        if let Some(task) = state.saver.take() {
            task.abort();
        }
        if enabled {
            let inner = Arc::clone(&self.inner);
            state.saver = Some(tokio::spawn(async move {
                loop {
                    tokio::time::sleep(AUTO_SAVE_INTERVAL).await;
                    inner.save_if_dirty().await;
                }
            }));
        }
        true
    }
}

impl Drop for AutoSaver {
    fn drop(&mut self) {
        if let Some(task) = self.inner.state.lock().expect("autosave lock").saver.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "autosave_test.rs"]
mod tests;
