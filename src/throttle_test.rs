use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::config::SyncConfig;
use crate::envelope::WireFrame;
use crate::transport::Transport;
use crate::transport::test_transport::{MockLink, MockTransport};

async fn connected_throttler() -> (EditThrottler, MockLink) {
    let transport = Arc::new(MockTransport::new());
    let client = SyncClient::with_transport(SyncConfig::default(), Arc::clone(&transport) as Arc<dyn Transport>);
    client.connect(None).await.expect("connect");
    let link = transport.take_link();
    (EditThrottler::new(client, "r1", "f1", "ann", ""), link)
}

fn sends_to(frames: &[WireFrame], destination: &str) -> Vec<serde_json::Value> {
    frames
        .iter()
        .filter_map(|frame| match frame {
            WireFrame::Send { destination: d, body } if d == destination => Some(body.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn rapid_edits_collapse_into_one_broadcast_with_the_last_content() {
    let (throttler, mut link) = connected_throttler().await;

    for i in 0..10 {
        throttler.on_local_edit(&format!("draft {i}"));
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let edits = sends_to(&link.sent_frames(), "/app/file-edit");
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["content"], "draft 9");
    assert_eq!(edits[0]["roomId"], "r1");
    assert_eq!(edits[0]["fileId"], "f1");
}

#[tokio::test(start_paused = true)]
async fn a_pause_longer_than_the_window_yields_a_second_broadcast() {
    let (throttler, mut link) = connected_throttler().await;

    throttler.on_local_edit("first");
    tokio::time::sleep(Duration::from_millis(150)).await;
    throttler.on_local_edit("second");
    tokio::time::sleep(Duration::from_millis(150)).await;

    let edits = sends_to(&link.sent_frames(), "/app/file-edit");
    assert_eq!(edits.len(), 2);
    assert_eq!(edits[0]["content"], "first");
    assert_eq!(edits[1]["content"], "second");
}

#[tokio::test(start_paused = true)]
async fn typing_pulse_fires_started_once_and_stopped_after_idle() {
    let (throttler, mut link) = connected_throttler().await;

    // Keystrokes inside the idle window share one started pulse.
    throttler.on_local_edit("a");
    tokio::time::sleep(Duration::from_millis(200)).await;
    throttler.on_local_edit("ab");
    assert!(throttler.is_typing());

    let frames = link.sent_frames();
    assert_eq!(sends_to(&frames, "/app/editing-started").len(), 1);
    assert!(sends_to(&frames, "/app/editing-stopped").is_empty());

    // 300 ms of quiet ends the pulse.
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(!throttler.is_typing());
    let stopped = sends_to(&link.sent_frames(), "/app/editing-stopped");
    assert_eq!(stopped.len(), 1);
    assert_eq!(stopped[0]["username"], "ann");

    // The next keystroke starts a fresh pulse.
    throttler.on_local_edit("abc");
    assert_eq!(sends_to(&link.sent_frames(), "/app/editing-started").len(), 1);
}

#[tokio::test(start_paused = true)]
async fn remote_broadcast_overwrites_the_view_mid_window() {
    let (throttler, mut link) = connected_throttler().await;

    throttler.on_local_edit("local draft");
    throttler.apply_remote("remote wins");
    assert_eq!(throttler.content(), "remote wins");

    // The pending broadcast still carries the keystroke-time snapshot; the
    // view keeps the remote value.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let edits = sends_to(&link.sent_frames(), "/app/file-edit");
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["content"], "local draft");
    assert_eq!(throttler.content(), "remote wins");
}

#[tokio::test(start_paused = true)]
async fn edits_while_disconnected_update_the_view_and_send_nothing() {
    let transport = Arc::new(MockTransport::new());
    let client = SyncClient::with_transport(SyncConfig::default(), transport as Arc<dyn Transport>);
    let throttler = EditThrottler::new(client, "r1", "f1", "ann", "seed");

    throttler.on_local_edit("offline edit");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(throttler.content(), "offline edit");
}
