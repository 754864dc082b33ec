//! End-to-end exercises against an in-process broker.
//!
//! The broker speaks the real wire protocol over axum's websocket support:
//! it checks the bearer token at upgrade, tracks per-connection
//! subscriptions, answers `join-file-room` with a targeted content-sync
//! frame, and relays chat to room subscribers.

use std::collections::HashMap;
use std::net::SocketAddr;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use serde_json::json;
use tokio::time::{Duration, timeout};

use roomsync::chat::ChatChannel;
use roomsync::config::SyncConfig;
use roomsync::connection::SyncClient;
use roomsync::envelope::{WireFrame, decode_frame, encode_frame};
use roomsync::session::{FileSession, SessionEvent, SessionPhase};

const TOKEN: &str = "it-token";

// =============================================================================
// BROKER
// =============================================================================

async fn handle_ws(headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value == format!("Bearer {TOKEN}"));
    if !authorized {
        return (StatusCode::UNAUTHORIZED, "bearer token required").into_response();
    }
    ws.on_upgrade(run_connection)
}

async fn run_connection(mut socket: WebSocket) {
    // Subscription id -> destination for this connection.
    let mut subs: HashMap<uuid::Uuid, String> = HashMap::new();

    while let Some(Ok(message)) = socket.recv().await {
        let Message::Text(text) = message else { continue };
        let Ok(frame) = decode_frame(&text) else { continue };
        match frame {
            WireFrame::Subscribe { id, destination } => {
                subs.insert(id, destination);
            }
            WireFrame::Unsubscribe { id, .. } => {
                subs.remove(&id);
            }
            WireFrame::Send { destination, body } => {
                let reply = match destination.as_str() {
                    "/app/join-file-room" => {
                        let room = body["roomId"].as_str().unwrap_or_default();
                        let file = body["fileId"].as_str().unwrap_or_default();
                        Some((
                            format!("/topic/room.{room}.file.{file}.edit"),
                            json!({"content": "hello"}),
                        ))
                    }
                    "/app/chat.message" => {
                        let room = body["roomId"].as_str().unwrap_or_default();
                        Some((
                            format!("/topic/room.{room}.chat"),
                            json!({
                                "userId": body["userId"],
                                "name": body["name"],
                                "text": body["text"],
                            }),
                        ))
                    }
                    _ => None,
                };
                // Relay only to destinations this connection subscribed to.
                if let Some((topic, body)) = reply {
                    if subs.values().any(|d| *d == topic) {
                        let out = encode_frame(&WireFrame::Message { destination: topic, body })
                            .expect("encode");
                        if socket.send(Message::Text(out.into())).await.is_err() {
                            return;
                        }
                    }
                }
            }
            WireFrame::Message { .. } | WireFrame::Error { .. } => {}
        }
    }
}

async fn spawn_broker() -> SocketAddr {
    // First caller wins; later tests reuse the installed subscriber.
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let app = Router::new().route("/ws", any(handle_ws));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind broker");
    let addr = listener.local_addr().expect("broker addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("broker serve");
    });
    addr
}

async fn connected_client() -> SyncClient {
    let addr = spawn_broker().await;
    let client = SyncClient::new(SyncConfig::new(format!("ws://{addr}/ws")));
    client.connect(Some(TOKEN)).await.expect("connect");
    client
}

// =============================================================================
// TESTS
// =============================================================================

#[tokio::test]
async fn upgrade_is_refused_without_the_bearer_token() {
    let addr = spawn_broker().await;
    let client = SyncClient::new(SyncConfig::new(format!("ws://{addr}/ws")));

    assert!(client.connect(None).await.is_err());
    assert!(!client.is_connected());
}

#[tokio::test]
async fn opening_a_file_receives_the_content_sync_snapshot() {
    let client = connected_client().await;
    let (session, mut events) = FileSession::new(client, "r1", "ann");

    // The edit subscription is registered before the join broadcast, so
    // the targeted snapshot the join triggers is never missed.
    session.open_file("f1").expect("open file");
    assert_eq!(session.phase(), SessionPhase::Joined);

    let event = timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("event timeout")
        .expect("event stream open");
    match event {
        SessionEvent::RemoteEdit { file_id, content } => {
            assert_eq!(file_id, "f1");
            assert_eq!(content, "hello");
        }
        other => panic!("expected content sync, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_round_trips_through_the_broker() {
    let client = connected_client().await;
    let (channel, mut messages) = ChatChannel::new(client, "r1", "u-1", "ann");

    channel.attach().expect("attach");
    channel.send("hello room").expect("send");

    let message = timeout(Duration::from_secs(5), messages.recv())
        .await
        .expect("message timeout")
        .expect("message stream open");
    assert_eq!(message.name, "ann");
    assert_eq!(message.text, "hello room");
}
