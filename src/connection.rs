//! Connection manager — owns the one multiplexed link and its lifecycle.
//!
//! DESIGN
//! ======
//! `SyncClient` wraps the transport, the subscription registry, and a reader
//! task that dispatches inbound broadcasts to handlers. All higher protocol
//! components multiplex over one client; none may assume exclusive use of
//! the transport.
//!
//! RECONNECT
//! =========
//! Unexpected closure schedules a reconnect with linear back-off: attempt N
//! waits `base * N`. The attempt counter increments before scheduling and
//! resets to zero on every successful connect. After the configured maximum
//! of consecutive failures the client gives up and stays disconnected; only
//! an explicit `connect()` restarts it. Explicit `disconnect()` never
//! triggers a reconnect.
//!
//! Each installed link carries a generation number. Reader tasks and pending
//! reconnects check it first, so a stale link observed closing after an
//! explicit disconnect (or after a newer link was installed) is ignored.

use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::config::SyncConfig;
use crate::envelope::{Envelope, WireFrame, decode_frame, encode_frame};
use crate::error::SyncError;
use crate::registry::{SubscriptionId, SubscriptionRegistry};
use crate::transport::{Transport, TransportLink, WsTransport};

/// Best-effort view of the connection lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

struct ConnState {
    status: ConnectionStatus,
    writer: Option<mpsc::UnboundedSender<String>>,
    token: Option<String>,
    /// Consecutive failed reconnects since the last successful connect.
    attempts: u32,
    /// Bumped on every installed link and on explicit disconnect.
    generation: u64,
    /// Set when automatic reconnection has been exhausted.
    exhausted: bool,
}

struct ClientInner {
    config: SyncConfig,
    transport: Arc<dyn Transport>,
    registry: SubscriptionRegistry,
    state: Mutex<ConnState>,
    status_tx: watch::Sender<ConnectionStatus>,
    /// Serializes concurrent `connect()` callers; the loser of the race sees
    /// `Connected` and returns immediately.
    connect_gate: tokio::sync::Mutex<()>,
}

/// Handle to the realtime sync connection. Cheap to clone; all clones share
/// the same link, registry, and reconnect state.
#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<ClientInner>,
}

impl SyncClient {
    /// Client over the production WebSocket transport.
    #[must_use]
    pub fn new(config: SyncConfig) -> Self {
        Self::with_transport(config, Arc::new(WsTransport))
    }

    /// Client over an injected transport (tests use an in-memory one).
    #[must_use]
    pub fn with_transport(config: SyncConfig, transport: Arc<dyn Transport>) -> Self {
        let (status_tx, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                registry: SubscriptionRegistry::new(),
                state: Mutex::new(ConnState {
                    status: ConnectionStatus::Disconnected,
                    writer: None,
                    token: None,
                    attempts: 0,
                    generation: 0,
                    exhausted: false,
                }),
                status_tx,
                connect_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    /// Connect to the broker, resolving once the link reports connected.
    ///
    /// Already-connected clients return immediately without reconnecting.
    /// A provided bearer token replaces the stored one and is reused by
    /// automatic reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] if the handshake fails.
    pub async fn connect(&self, token: Option<&str>) -> Result<(), SyncError> {
        let _gate = self.inner.connect_gate.lock().await;

        let (stored, generation) = {
            let mut state = self.inner.state.lock().expect("conn lock");
            if state.status == ConnectionStatus::Connected {
                return Ok(());
            }
            state.status = ConnectionStatus::Connecting;
            state.exhausted = false;
            if token.is_some() {
                state.token = token.map(ToOwned::to_owned);
            }
            (state.token.clone(), state.generation)
        };
        self.inner.status_tx.send_replace(ConnectionStatus::Connecting);

        match self
            .inner
            .transport
            .open(&self.inner.config.ws_url, stored.as_deref())
            .await
        {
            Ok(link) => {
                if self.inner.install_link(link, generation) {
                    Ok(())
                } else {
                    // An explicit disconnect moved the generation while the
                    // handshake was in flight; the disconnect wins.
                    self.inner.status_tx.send_replace(ConnectionStatus::Disconnected);
                    Err(SyncError::Connect("disconnected during handshake".to_owned()))
                }
            }
            Err(e) => {
                self.inner.state.lock().expect("conn lock").status = ConnectionStatus::Disconnected;
                self.inner.status_tx.send_replace(ConnectionStatus::Disconnected);
                Err(e)
            }
        }
    }

    /// Tear down the connection: unsubscribe every live subscription, then
    /// drop the transport. Idempotent; never schedules a reconnect.
    pub fn disconnect(&self) {
        let subs = self.inner.registry.drain();
        {
            let mut state = self.inner.state.lock().expect("conn lock");
            if let Some(writer) = state.writer.take() {
                // Per-destination cleanup frames go out before the link drops.
                for (id, destination) in subs {
                    if let Ok(text) = encode_frame(&WireFrame::Unsubscribe { id, destination }) {
                        let _ = writer.send(text);
                    }
                }
            }
            state.status = ConnectionStatus::Disconnected;
            state.attempts = 0;
            state.generation += 1;
        }
        self.inner.status_tx.send_replace(ConnectionStatus::Disconnected);
    }

    /// Best-effort current state.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status() == ConnectionStatus::Connected
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.lock().expect("conn lock").status
    }

    /// Watch channel following the lifecycle state.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status_tx.subscribe()
    }

    /// True once automatic reconnection has given up. Cleared by an explicit
    /// `connect()`.
    #[must_use]
    pub fn reconnects_exhausted(&self) -> bool {
        self.inner.state.lock().expect("conn lock").exhausted
    }

    /// Publish a raw JSON body to a destination.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SyncError::NotConnected`] while disconnected —
    /// nothing is queued.
    pub fn publish(&self, destination: &str, body: Value) -> Result<(), SyncError> {
        self.inner
            .send_frame(&WireFrame::Send { destination: destination.to_owned(), body })
    }

    /// Publish a typed payload to a destination.
    ///
    /// # Errors
    ///
    /// As [`SyncClient::publish`], plus [`SyncError::Codec`] if the payload
    /// fails to serialize.
    pub fn publish_payload<T: Serialize>(&self, destination: &str, payload: &T) -> Result<(), SyncError> {
        self.publish(destination, serde_json::to_value(payload)?)
    }

    /// Subscribe a handler to a destination, returning its cancellation
    /// handle. Subscribing the same destination twice yields two independent
    /// deliveries per broadcast.
    ///
    /// # Errors
    ///
    /// Fails fast with [`SyncError::NotConnected`] while disconnected.
    pub fn subscribe<F>(&self, destination: &str, handler: F) -> Result<SubscriptionId, SyncError>
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        if !self.is_connected() {
            return Err(SyncError::NotConnected);
        }
        let id = self
            .inner
            .registry
            .insert(destination.to_owned(), Arc::new(handler));
        // Losing the race with a concurrent disconnect just means the
        // subscribe frame is dropped with the link; the registry entry was
        // already drained by disconnect in that case.
        let _ = self.inner.send_frame(&WireFrame::Subscribe { id, destination: destination.to_owned() });
        Ok(id)
    }

    /// Cancel a subscription. Safe to call twice and safe after the
    /// connection is gone — never an error.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(destination) = self.inner.registry.remove(id) {
            let _ = self.inner.send_frame(&WireFrame::Unsubscribe { id, destination });
        }
    }
}

impl ClientInner {
    fn send_frame(&self, frame: &WireFrame) -> Result<(), SyncError> {
        let text = encode_frame(frame)?;
        let state = self.state.lock().expect("conn lock");
        if state.status != ConnectionStatus::Connected {
            return Err(SyncError::NotConnected);
        }
        let writer = state.writer.as_ref().ok_or(SyncError::NotConnected)?;
        writer
            .send(text)
            .map_err(|_| SyncError::Transport("link closed".to_owned()))
    }

    /// Adopt a freshly opened link: reset the attempt counter, bump the
    /// generation, and start its reader task.
    ///
    /// Returns false without installing when the generation moved past
    /// `expected` while the handshake was in flight (an explicit
    /// disconnect intervened); the stale link is dropped on the floor.
    fn install_link(self: &Arc<Self>, link: TransportLink, expected: u64) -> bool {
        let generation = {
            let mut state = self.state.lock().expect("conn lock");
            if state.generation != expected {
                return false;
            }
            state.status = ConnectionStatus::Connected;
            state.writer = Some(link.outbound);
            state.attempts = 0;
            state.generation += 1;
            state.generation
        };
        self.status_tx.send_replace(ConnectionStatus::Connected);
        info!(generation, "connected");

        let inner = Arc::clone(self);
        tokio::spawn(read_loop(inner, generation, link.inbound));
        true
    }

    /// React to the reader task ending for the current link.
    fn link_down(self: &Arc<Self>, generation: u64) {
        {
            let mut state = self.state.lock().expect("conn lock");
            if state.generation != generation {
                // A newer link exists or the closure was explicit.
                return;
            }
            state.status = ConnectionStatus::Disconnected;
            state.writer = None;
        }
        self.status_tx.send_replace(ConnectionStatus::Disconnected);
        warn!("connection closed unexpectedly");
        self.schedule_reconnect();
    }

    fn schedule_reconnect(self: &Arc<Self>) {
        let (attempt, generation) = {
            let mut state = self.state.lock().expect("conn lock");
            if state.attempts >= self.config.max_reconnect_attempts {
                state.exhausted = true;
                error!(
                    attempts = state.attempts,
                    "max reconnection attempts reached"
                );
                return;
            }
            state.attempts += 1;
            (state.attempts, state.generation)
        };

        let delay = self.config.reconnect_base_delay * attempt;
        info!(
            attempt,
            max = self.config.max_reconnect_attempts,
            ?delay,
            "reconnect scheduled"
        );

        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let token = {
                let state = inner.state.lock().expect("conn lock");
                if state.generation != generation || state.status != ConnectionStatus::Disconnected {
                    // Explicit connect/disconnect intervened during the wait.
                    return;
                }
                state.token.clone()
            };

            match inner
                .transport
                .open(&inner.config.ws_url, token.as_deref())
                .await
            {
                Ok(link) => {
                    // Refused means a disconnect landed during the dial;
                    // the reconnect chain ends here.
                    let _ = inner.install_link(link, generation);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "reconnect attempt failed");
                    inner.schedule_reconnect();
                }
            }
        });
    }
}

/// Pump inbound frames into the registry until the link closes.
async fn read_loop(inner: Arc<ClientInner>, generation: u64, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = rx.recv().await {
        match decode_frame(&text) {
            Ok(WireFrame::Message { destination, body }) => {
                inner.registry.dispatch(&Envelope { destination, body });
            }
            Ok(WireFrame::Error { message }) => {
                warn!(%message, "broker reported an error");
            }
            Ok(frame) => {
                warn!(?frame, "ignoring unexpected client-bound frame");
            }
            // Malformed payloads are dropped per message; the subscription
            // and the connection stay up.
            Err(e) => {
                warn!(error = %e, "dropping malformed inbound frame");
            }
        }
    }
    inner.link_down(generation);
}

#[cfg(test)]
#[path = "connection_test.rs"]
mod tests;
