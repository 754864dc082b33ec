//! Room listing and creation.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub created_by_username: String,
    pub created_by_id: String,
}

#[derive(Serialize)]
struct CreateRoomRequest<'a> {
    name: &'a str,
}

impl ApiClient {
    /// All rooms visible to the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn rooms(&self) -> Result<Vec<Room>, ApiError> {
        self.get_json("/rooms").await
    }

    /// Create a room owned by the authenticated user.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn create_room(&self, name: &str) -> Result<Room, ApiError> {
        self.post_json("/rooms", &CreateRoomRequest { name }).await
    }

    /// A single room by id.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response, 404 if the
    /// room does not exist.
    pub async fn room(&self, id: &str) -> Result<Room, ApiError> {
        self.get_json(&format!("/rooms/{id}")).await
    }
}
