//! File CRUD and content persistence.
//!
//! `update_content` is the call the auto-saver drives; the rest back the
//! file tree UI.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResponse {
    pub id: String,
    pub folder_id: String,
    pub name: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FileRequest<'a> {
    folder_id: &'a str,
    name: &'a str,
    content: &'a str,
}

impl ApiClient {
    /// Files inside a folder.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn files(&self, folder_id: &str) -> Result<Vec<FileResponse>, ApiError> {
        self.get_json(&format!("/files/folder/{folder_id}")).await
    }

    /// Create a file, optionally with initial content.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn create_file(&self, folder_id: &str, name: &str, content: &str) -> Result<FileResponse, ApiError> {
        self.post_json("/files", &FileRequest { folder_id, name, content })
            .await
    }

    /// A single file with its content.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response, 404 if the
    /// file does not exist.
    pub async fn file(&self, id: &str) -> Result<FileResponse, ApiError> {
        self.get_json(&format!("/files/{id}")).await
    }

    /// Rename a file. Folder and content fields are ignored by the
    /// backend on this route.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn rename_file(&self, id: &str, name: &str) -> Result<FileResponse, ApiError> {
        self.put_json(&format!("/files/{id}"), &FileRequest { folder_id: "", name, content: "" })
            .await
    }

    /// Persist new content for a file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn update_content(&self, id: &str, content: &str) -> Result<FileResponse, ApiError> {
        self.put_json(
            &format!("/files/{id}/content"),
            &FileRequest { folder_id: "", name: "", content },
        )
        .await
    }

    /// Delete a file.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response.
    pub async fn delete_file(&self, id: &str) -> Result<(), ApiError> {
        self.delete(&format!("/files/{id}")).await
    }
}
