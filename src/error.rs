//! Error taxonomies for the sync core and the REST collaborators.
//!
//! Transport failures feed the reconnect machinery and never panic the
//! caller; usage errors (publishing while disconnected) are raised
//! synchronously so callers can detect dropped sends instead of silently
//! losing data.

use thiserror::Error;

/// Errors produced by the realtime connection and the protocol components.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Publish or subscribe attempted without a live connection.
    #[error("not connected")]
    NotConnected,
    /// The transport handshake failed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// The underlying link failed mid-flight.
    #[error("transport error: {0}")]
    Transport(String),
    /// A wire frame could not be serialized or parsed.
    #[error("wire codec error: {0}")]
    Codec(#[from] serde_json::Error),
    /// All automatic reconnect attempts were consumed. Only an explicit
    /// `connect()` call restarts the client after this.
    #[error("max reconnection attempts reached")]
    ReconnectsExhausted,
}

/// Errors from the collaborator REST API (rooms, folders, files, auth).
///
/// These are surfaced to the caller and never retried by this crate.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The HTTP request itself failed (connect, timeout, body decode).
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, best effort.
        message: String,
    },
}
