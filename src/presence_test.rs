use std::sync::Arc;

use serde_json::json;

use super::*;
use crate::config::SyncConfig;
use crate::envelope::WireFrame;
use crate::transport::Transport;
use crate::transport::test_transport::{MockLink, MockTransport};

async fn joined_tracker() -> (PresenceTracker, mpsc::UnboundedReceiver<PresenceNotice>, MockLink) {
    let transport = Arc::new(MockTransport::new());
    let client = SyncClient::with_transport(SyncConfig::default(), Arc::clone(&transport) as Arc<dyn Transport>);
    client.connect(None).await.expect("connect");
    let link = transport.take_link();
    let (tracker, rx) = PresenceTracker::new(client, "r1", "u1", "ann");
    tracker.join().expect("join");
    (tracker, rx, link)
}

async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn join_subscribes_before_broadcasting() {
    let (_tracker, _rx, mut link) = joined_tracker().await;

    let frames = link.sent_frames();
    assert_eq!(frames.len(), 2);
    assert!(matches!(
        &frames[0],
        WireFrame::Subscribe { destination, .. } if destination == "/topic/room.r1.presence"
    ));
    let WireFrame::Send { destination, body } = &frames[1] else {
        panic!("expected join broadcast");
    };
    assert_eq!(destination, "/app/presence.join");
    assert_eq!(*body, json!({"roomId":"r1","userId":"u1","name":"ann"}));
}

#[tokio::test(start_paused = true)]
async fn rejoin_replaces_the_subscription_and_broadcasts_again() {
    let (tracker, _rx, mut link) = joined_tracker().await;
    link.sent_frames();

    tracker.join().expect("rejoin");
    let frames = link.sent_frames();
    assert_eq!(frames.len(), 3);
    assert!(matches!(&frames[0], WireFrame::Unsubscribe { .. }));
    assert!(matches!(
        &frames[1],
        WireFrame::Subscribe { destination, .. } if destination == "/topic/room.r1.presence"
    ));
    assert!(matches!(&frames[2], WireFrame::Send { destination, .. } if destination == "/app/presence.join"));
}

#[tokio::test(start_paused = true)]
async fn roster_snapshot_replaces_the_list_wholesale() {
    let (tracker, _rx, link) = joined_tracker().await;

    link.deliver(&WireFrame::Message {
        destination: "/topic/room.r1.presence".to_owned(),
        body: json!({"type":"presence.users","users":[
            {"userId":"u1","name":"ann"},
            {"userId":"u2","name":"bob"}
        ]}),
    });
    settle().await;
    assert_eq!(tracker.users().len(), 2);

    // A later snapshot wins outright; nothing is merged.
    link.deliver(&WireFrame::Message {
        destination: "/topic/room.r1.presence".to_owned(),
        body: json!({"type":"presence.users","users":[{"userId":"u3","name":"cyd"}]}),
    });
    settle().await;
    let users = tracker.users();
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].user_id, "u3");
}

#[tokio::test(start_paused = true)]
async fn transient_events_notify_without_touching_the_roster() {
    let (tracker, mut rx, link) = joined_tracker().await;

    link.deliver(&WireFrame::Message {
        destination: "/topic/room.r1.presence".to_owned(),
        body: json!({"type":"presence.users","users":[{"userId":"u2","name":"bob"}]}),
    });
    link.deliver(&WireFrame::Message {
        destination: "/topic/room.r1.presence".to_owned(),
        body: json!({"type":"presence.event","event":"joined","message":"cyd joined the room"}),
    });
    settle().await;

    assert_eq!(
        rx.try_recv().expect("notice"),
        PresenceNotice { event: "joined".to_owned(), message: "cyd joined the room".to_owned() }
    );
    // The notice did not add cyd to the roster.
    assert_eq!(tracker.users().len(), 1);
    assert_eq!(tracker.users()[0].user_id, "u2");
}

#[tokio::test(start_paused = true)]
async fn leave_broadcasts_unsubscribes_and_clears() {
    let (tracker, _rx, mut link) = joined_tracker().await;
    link.deliver(&WireFrame::Message {
        destination: "/topic/room.r1.presence".to_owned(),
        body: json!({"type":"presence.users","users":[{"userId":"u2","name":"bob"}]}),
    });
    settle().await;
    link.sent_frames();

    tracker.leave();
    tracker.leave(); // safe to repeat

    let frames = link.sent_frames();
    let WireFrame::Send { destination, body } = &frames[0] else {
        panic!("expected leave broadcast");
    };
    assert_eq!(destination, "/app/presence.leave");
    assert_eq!(*body, json!({"roomId":"r1","userId":"u1"}));
    assert!(matches!(&frames[1], WireFrame::Unsubscribe { .. }));
    assert_eq!(frames.len(), 2);
    assert!(tracker.users().is_empty());
}

#[tokio::test(start_paused = true)]
async fn join_while_disconnected_fails_fast() {
    let transport = Arc::new(MockTransport::new());
    let client = SyncClient::with_transport(SyncConfig::default(), transport as Arc<dyn Transport>);
    let (tracker, _rx) = PresenceTracker::new(client, "r1", "u1", "ann");

    assert!(matches!(tracker.join(), Err(SyncError::NotConnected)));
}
