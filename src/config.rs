//! Connection configuration and protocol timing constants.
//!
//! The config is injected at construction time — there is no global client
//! instance, so tests never share connection state.

use std::time::Duration;

/// Default broker endpoint, matching the local dev stack.
pub const DEFAULT_WS_URL: &str = "ws://localhost:8081/ws";

/// Reconnect attempts allowed before the client gives up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Base reconnect delay; attempt N waits `base * N` (linear back-off).
pub const DEFAULT_RECONNECT_BASE_DELAY: Duration = Duration::from_millis(3000);

/// Quiet period after the last keystroke before the content broadcast fires.
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Idle period after which an `editing-stopped` pulse is sent.
pub const EDITING_PULSE_IDLE: Duration = Duration::from_millis(300);

/// Cadence of the typing-roster staleness sweep.
pub const TYPING_SWEEP_INTERVAL: Duration = Duration::from_millis(1000);

/// Age at which a typing entry is evicted without an explicit stop event.
pub const TYPING_STALENESS: Duration = Duration::from_millis(3000);

/// Cadence of the auto-save dirty check.
pub const AUTO_SAVE_INTERVAL: Duration = Duration::from_secs(10);

/// Connection endpoint and back-off policy for a [`crate::SyncClient`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket endpoint of the pub/sub broker.
    pub ws_url: String,
    /// Consecutive reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Base delay for linear reconnect back-off.
    pub reconnect_base_delay: Duration,
}

impl SyncConfig {
    /// Config for the given endpoint with default back-off policy.
    #[must_use]
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self { ws_url: ws_url.into(), ..Self::default() }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_owned(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: DEFAULT_RECONNECT_BASE_DELAY,
        }
    }
}
