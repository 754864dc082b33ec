//! # roomsync
//!
//! Realtime sync core for a collaborative code-editing workspace. Keeps a
//! websocket session to the broker alive with bounded reconnection, routes
//! op-tagged JSON frames to per-topic subscriptions, and builds the
//! collaboration features on top: file rooms with content sync, throttled
//! edit broadcasting, typing and presence tracking, room chat, and a
//! shared auto-save toggle.
//!
//! Everything outside the socket goes through [`api::ApiClient`], a thin
//! REST client for auth and the room/folder/file tree.

pub mod api;
pub mod autosave;
pub mod chat;
pub mod config;
pub mod connection;
pub mod envelope;
pub mod error;
pub mod presence;
pub mod registry;
pub mod session;
pub mod throttle;
pub mod transport;
pub mod typing;

pub use config::SyncConfig;
pub use connection::{ConnectionStatus, SyncClient};
pub use error::{ApiError, SyncError};
