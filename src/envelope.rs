//! Wire frame model, payload types, and destination builders.
//!
//! DESIGN
//! ======
//! The multiplexed pub/sub connection carries JSON text frames tagged by
//! `op`. `send`/`subscribe`/`unsubscribe` flow client→server;
//! `message`/`error` flow server→client. Payload bodies are bit-exact JSON
//! with camelCase field names, matching what the broker and its other
//! clients exchange.
//!
//! Everything that knows a wire field name lives in this module; the rest
//! of the crate works with the typed structs.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::SyncError;

// =============================================================================
// WIRE FRAMES
// =============================================================================

/// A single frame on the realtime wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum WireFrame {
    /// Client publishes `body` to an `/app/...` destination.
    Send {
        /// Target destination.
        destination: String,
        /// JSON payload, passed through bit-exact.
        body: Value,
    },
    /// Client opens a subscription to a `/topic/...` destination.
    Subscribe {
        /// Client-chosen subscription handle.
        id: Uuid,
        /// Subscribed destination.
        destination: String,
    },
    /// Client closes a previously opened subscription.
    Unsubscribe {
        /// Handle from the matching subscribe frame.
        id: Uuid,
        /// Destination of the closed subscription.
        destination: String,
    },
    /// Broker delivers a broadcast on a subscribed destination.
    Message {
        /// Originating destination.
        destination: String,
        /// JSON payload, passed through bit-exact.
        body: Value,
    },
    /// Broker-reported protocol error.
    Error {
        /// Human-readable description.
        message: String,
    },
}

/// Encode a frame as JSON wire text.
///
/// # Errors
///
/// Returns [`SyncError::Codec`] if serialization fails (never in practice
/// for these types).
pub fn encode_frame(frame: &WireFrame) -> Result<String, SyncError> {
    Ok(serde_json::to_string(frame)?)
}

/// Decode JSON wire text into a frame.
///
/// # Errors
///
/// Returns [`SyncError::Codec`] for malformed text. Callers drop and log the
/// frame; a bad message never tears down the connection.
pub fn decode_frame(text: &str) -> Result<WireFrame, SyncError> {
    Ok(serde_json::from_str(text)?)
}

/// A delivered broadcast, as handed to subscription handlers.
#[derive(Clone, Debug, PartialEq)]
pub struct Envelope {
    /// Destination the broadcast arrived on.
    pub destination: String,
    /// JSON payload.
    pub body: Value,
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Chat broadcast received on `/topic/room.{roomId}.chat`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub user_id: String,
    pub name: String,
    pub text: String,
}

/// Chat command published to `/app/chat.message`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPublish {
    pub room_id: String,
    pub user_id: String,
    pub name: String,
    pub text: String,
}

/// Whole-document content broadcast on the file edit topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditBroadcast {
    pub content: String,
}

/// Edit command published to `/app/file-edit`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditPublish {
    pub room_id: String,
    pub file_id: String,
    pub content: String,
}

/// Payload for the file-room lifecycle commands: `join-file-room`,
/// `leave-file-room`, `editing-started`, `editing-stopped`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRoomAction {
    pub room_id: String,
    pub file_id: String,
    pub username: String,
}

/// Auto-save preference broadcast on the file autosave topic.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AutoSaveBroadcast {
    pub enabled: bool,
    pub username: String,
}

/// Auto-save toggle command published to `/app/auto-save-toggle`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSavePublish {
    pub room_id: String,
    pub file_id: String,
    pub enabled: bool,
    pub username: String,
}

/// Aggregated per-file editor activity broadcast by the broker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditingIndicators {
    pub file_id: String,
    pub editing_count: u32,
    pub editors: Vec<String>,
}

/// One online room member.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceUser {
    pub user_id: String,
    pub name: String,
}

/// The two inbound shapes on the presence topic, discriminated by `type`.
///
/// `Users` is the authoritative roster snapshot and replaces the local list
/// wholesale; `Event` is a transient one-shot notice and never mutates the
/// roster.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PresenceMessage {
    #[serde(rename = "presence.users")]
    Users { users: Vec<PresenceUser> },
    #[serde(rename = "presence.event")]
    Event { event: String, message: String },
}

/// Join command published to `/app/presence.join`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceJoin {
    pub room_id: String,
    pub user_id: String,
    pub name: String,
}

/// Leave command published to `/app/presence.leave`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceLeave {
    pub room_id: String,
    pub user_id: String,
}

/// Typing event, both inbound and outbound on the room typing channel.
///
/// `timestamp` is an RFC 3339 string on the wire; receivers track their own
/// local clock for staleness and ignore it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingEvent {
    pub username: String,
    pub is_typing: bool,
    pub timestamp: String,
}

// =============================================================================
// DESTINATIONS
// =============================================================================

/// Destination builders and fixed command destinations.
///
/// Topic names are broker conventions and must match byte-for-byte; the
/// typing channel uses slash separators where the others use dots.
pub mod topics {
    pub const APP_CHAT_MESSAGE: &str = "/app/chat.message";
    pub const APP_FILE_EDIT: &str = "/app/file-edit";
    pub const APP_JOIN_FILE_ROOM: &str = "/app/join-file-room";
    pub const APP_LEAVE_FILE_ROOM: &str = "/app/leave-file-room";
    pub const APP_EDITING_STARTED: &str = "/app/editing-started";
    pub const APP_EDITING_STOPPED: &str = "/app/editing-stopped";
    pub const APP_AUTO_SAVE_TOGGLE: &str = "/app/auto-save-toggle";
    pub const APP_PRESENCE_JOIN: &str = "/app/presence.join";
    pub const APP_PRESENCE_LEAVE: &str = "/app/presence.leave";

    /// Room chat broadcast topic.
    #[must_use]
    pub fn room_chat(room_id: &str) -> String {
        format!("/topic/room.{room_id}.chat")
    }

    /// Whole-document edit broadcast topic for one file.
    #[must_use]
    pub fn file_edit(room_id: &str, file_id: &str) -> String {
        format!("/topic/room.{room_id}.file.{file_id}.edit")
    }

    /// Auto-save preference broadcast topic for one file.
    #[must_use]
    pub fn file_autosave(room_id: &str, file_id: &str) -> String {
        format!("/topic/room.{room_id}.file.{file_id}.autosave")
    }

    /// Aggregated editing-indicator topic for a room.
    #[must_use]
    pub fn editing_indicators(room_id: &str) -> String {
        format!("/topic/room.{room_id}.editing-indicators")
    }

    /// Presence topic for a room.
    #[must_use]
    pub fn presence(room_id: &str) -> String {
        format!("/topic/room.{room_id}.presence")
    }

    /// Inbound typing-event topic for a room.
    #[must_use]
    pub fn typing(room_id: &str) -> String {
        format!("/topic/room/{room_id}/typing")
    }

    /// Outbound typing-event command destination for a room.
    #[must_use]
    pub fn typing_app(room_id: &str) -> String {
        format!("/app/room/{room_id}/typing")
    }
}

#[cfg(test)]
#[path = "envelope_test.rs"]
mod tests;
