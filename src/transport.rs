//! Transport seam between the connection manager and the network.
//!
//! DESIGN
//! ======
//! A [`Transport`] opens one link at a time and hands back a pair of string
//! channels carrying wire-frame text. The WebSocket implementation pumps the
//! socket behind those channels; when either direction fails, the pumps stop
//! and the channel ends close, which is how the connection manager observes
//! an unexpected closure.
//!
//! The trait object keeps the reconnect state machine testable: unit tests
//! substitute an in-memory transport with scriptable failures.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::warn;

use crate::error::SyncError;

/// A live link to the broker: text frames out, text frames in.
///
/// Dropping `outbound` closes the link; `inbound` yielding `None` means the
/// link closed from the far side.
pub struct TransportLink {
    /// Outgoing wire-frame text.
    pub outbound: mpsc::UnboundedSender<String>,
    /// Incoming wire-frame text.
    pub inbound: mpsc::UnboundedReceiver<String>,
}

/// Dials the broker. Implemented over WebSockets in production and over
/// in-memory channels in tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a link, resolving once the handshake completes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Connect`] if the handshake fails.
    async fn open(&self, url: &str, token: Option<&str>) -> Result<TransportLink, SyncError>;
}

/// Production transport over `tokio-tungstenite`.
///
/// The bearer token, when present, travels as an `Authorization` header on
/// the upgrade request.
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(&self, url: &str, token: Option<&str>) -> Result<TransportLink, SyncError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SyncError::Connect("token is not a valid header value".to_owned()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (socket, _response) = connect_async(request)
            .await
            .map_err(|e| SyncError::Connect(e.to_string()))?;
        let (mut sink, mut stream) = socket.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        // Outbound pump: channel -> socket. Ends when the sender side drops
        // (explicit disconnect) or the socket rejects a write.
        tokio::spawn(async move {
            while let Some(text) = out_rx.recv().await {
                if sink.send(Message::text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Inbound pump: socket -> channel. Ends on close or receive error,
        // which drops `in_tx` and signals closure to the reader.
        tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(Message::Text(text)) => {
                        if in_tx.send(text.to_string()).is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    // Ping/pong and binary frames are transport noise here.
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "websocket receive failed");
                        break;
                    }
                }
            }
        });

        Ok(TransportLink { outbound: out_tx, inbound: in_rx })
    }
}

// =============================================================================
// TEST TRANSPORT
// =============================================================================

#[cfg(test)]
pub mod test_transport {
    use std::sync::Mutex;

    use super::*;

    /// Broker-side handles of one mock link.
    pub struct MockLink {
        /// Push inbound frames to the client. Dropping this simulates an
        /// unexpected close.
        pub to_client: mpsc::UnboundedSender<String>,
        /// Frames the client sent.
        pub from_client: mpsc::UnboundedReceiver<String>,
    }

    impl MockLink {
        /// Drain and decode everything the client has sent so far.
        pub fn sent_frames(&mut self) -> Vec<crate::envelope::WireFrame> {
            let mut frames = Vec::new();
            while let Ok(text) = self.from_client.try_recv() {
                frames.push(crate::envelope::decode_frame(&text).expect("client sent valid frame"));
            }
            frames
        }

        /// Deliver one frame to the client.
        pub fn deliver(&self, frame: &crate::envelope::WireFrame) {
            let text = crate::envelope::encode_frame(frame).expect("encode");
            self.to_client.send(text).expect("client link open");
        }
    }

    #[derive(Default)]
    struct MockState {
        opens: u32,
        fail_remaining: u32,
        fail_always: bool,
        open_delay: Option<std::time::Duration>,
        tokens: Vec<Option<String>>,
        links: Vec<MockLink>,
    }

    /// In-memory transport with scriptable connect failures.
    #[derive(Default)]
    pub struct MockTransport {
        state: Mutex<MockState>,
    }

    impl MockTransport {
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail the next `n` opens, then succeed again.
        pub fn fail_next(&self, n: u32) {
            self.state.lock().expect("mock lock").fail_remaining = n;
        }

        /// Fail every open from now on (or stop doing so).
        pub fn fail_always(&self, yes: bool) {
            self.state.lock().expect("mock lock").fail_always = yes;
        }

        /// Make every open take this long before resolving, simulating a
        /// slow handshake.
        pub fn delay_opens(&self, delay: std::time::Duration) {
            self.state.lock().expect("mock lock").open_delay = Some(delay);
        }

        /// Number of `open` calls observed, successful or not.
        pub fn opens(&self) -> u32 {
            self.state.lock().expect("mock lock").opens
        }

        /// Tokens presented at each open, in order.
        pub fn tokens(&self) -> Vec<Option<String>> {
            self.state.lock().expect("mock lock").tokens.clone()
        }

        /// Take the broker-side handles of the most recent successful open.
        pub fn take_link(&self) -> MockLink {
            self.state
                .lock()
                .expect("mock lock")
                .links
                .pop()
                .expect("no successful open to take")
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn open(&self, _url: &str, token: Option<&str>) -> Result<TransportLink, SyncError> {
            let delay = {
                let mut state = self.state.lock().expect("mock lock");
                state.opens += 1;
                state.tokens.push(token.map(ToOwned::to_owned));
                if state.fail_always || state.fail_remaining > 0 {
                    state.fail_remaining = state.fail_remaining.saturating_sub(1);
                    return Err(SyncError::Connect("mock transport refused".to_owned()));
                }
                state.open_delay
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let mut state = self.state.lock().expect("mock lock");
            state.links.push(MockLink { to_client: in_tx, from_client: out_rx });
            Ok(TransportLink { outbound: out_tx, inbound: in_rx })
        }
    }
}
