//! Room chat channel.
//!
//! Chat is fan-out only: the broker relays every published message to the
//! room topic, including the sender's own, so the local history comes
//! from the topic rather than from local echo.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::SyncClient;
use crate::envelope::{ChatMessage, ChatPublish, topics};
use crate::error::SyncError;
use crate::registry::SubscriptionId;

/// Sends and receives chat messages for one room.
pub struct ChatChannel {
    client: SyncClient,
    room_id: String,
    user_id: String,
    name: String,
    sub: Mutex<Option<SubscriptionId>>,
    messages: mpsc::UnboundedSender<ChatMessage>,
}

impl ChatChannel {
    /// Channel for one room. The receiver yields every message relayed on
    /// the room's chat topic.
    #[must_use]
    pub fn new(
        client: SyncClient,
        room_id: impl Into<String>,
        user_id: impl Into<String>,
        name: impl Into<String>,
    ) -> (Self, mpsc::UnboundedReceiver<ChatMessage>) {
        let (messages, rx) = mpsc::unbounded_channel();
        let channel = Self {
            client,
            room_id: room_id.into(),
            user_id: user_id.into(),
            name: name.into(),
            sub: Mutex::new(None),
            messages,
        };
        (channel, rx)
    }

    /// Subscribe to the room's chat topic. Call again after a reconnect;
    /// the previous subscription is replaced.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn attach(&self) -> Result<(), SyncError> {
        let mut sub = self.sub.lock().expect("chat lock");
        if let Some(old) = sub.take() {
            self.client.unsubscribe(old);
        }
        let messages = self.messages.clone();
        let id = self
            .client
            .subscribe(&topics::room_chat(&self.room_id), move |envelope| {
                match serde_json::from_value::<ChatMessage>(envelope.body.clone()) {
                    Ok(message) => {
                        let _ = messages.send(message);
                    }
                    Err(e) => warn!(error = %e, "malformed chat message dropped"),
                }
            })?;
        *sub = Some(id);
        Ok(())
    }

    /// Unsubscribe from the chat topic. Safe to call repeatedly.
    pub fn detach(&self) {
        if let Some(sub) = self.sub.lock().expect("chat lock").take() {
            self.client.unsubscribe(sub);
        }
    }

    /// Publish a message to the room. The sender sees it again through
    /// the topic like everyone else.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotConnected`] while disconnected.
    pub fn send(&self, text: &str) -> Result<(), SyncError> {
        self.client.publish_payload(
            topics::APP_CHAT_MESSAGE,
            &ChatPublish {
                room_id: self.room_id.clone(),
                user_id: self.user_id.clone(),
                name: self.name.clone(),
                text: text.to_owned(),
            },
        )
    }
}

impl Drop for ChatChannel {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
