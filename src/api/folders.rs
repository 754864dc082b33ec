//! Folder CRUD within a room.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderResponse {
    pub id: String,
    pub room_id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FolderRequest<'a> {
    room_id: &'a str,
    name: &'a str,
}

impl ApiClient {
    /// Folders belonging to a room.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn folders(&self, room_id: &str) -> Result<Vec<FolderResponse>, ApiError> {
        self.get_json(&format!("/folders?roomId={room_id}")).await
    }

    /// Create a folder in a room.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn create_folder(&self, room_id: &str, name: &str) -> Result<FolderResponse, ApiError> {
        self.post_json("/folders", &FolderRequest { room_id, name }).await
    }

    /// Rename a folder. The backend identifies the folder by id alone, so
    /// the room field of the payload is left empty.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn rename_folder(&self, id: &str, name: &str) -> Result<FolderResponse, ApiError> {
        self.put_json(&format!("/folders/{id}"), &FolderRequest { room_id: "", name })
            .await
    }

    /// Delete a folder and everything inside it.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn delete_folder(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/folders/{id}")).await
    }
}
