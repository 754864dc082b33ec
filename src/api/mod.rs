//! REST collaborators: auth, rooms, folders, and files.
//!
//! These are external to the synchronization protocol — plain
//! request/response calls that never participate in the connection state
//! machine. Errors are surfaced to the caller and never retried here.

mod auth;
mod files;
mod folders;
mod rooms;

pub use auth::{AuthResponse, LoginRequest, RegisterRequest};
pub use files::FileResponse;
pub use folders::FolderResponse;
pub use rooms::Room;

use std::sync::Mutex;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::ApiError;

const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Thin HTTP client for the workspace backend.
///
/// Holds the bearer token captured at login; every subsequent request
/// carries it as an `Authorization` header.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl ApiClient {
    /// Client for the given API base URL (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Http`] if the underlying HTTP client cannot be
    /// built.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_owned(),
            token: Mutex::new(None),
        })
    }

    /// Store the bearer token for subsequent requests.
    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.lock().expect("token lock") = Some(token.into());
    }

    /// The stored bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.lock().expect("token lock").clone()
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self.http.request(method, format!("{}{path}", self.base_url));
        if let Some(token) = self.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        decode(self.request(reqwest::Method::GET, path).send().await?).await
    }

    async fn post_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        decode(self.request(reqwest::Method::POST, path).json(body).send().await?).await
    }

    async fn put_json<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        decode(self.request(reqwest::Method::PUT, path).json(body).send().await?).await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let response = self.request(reqwest::Method::DELETE, path).send().await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let response = check_status(response).await?;
    Ok(response.json().await?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ApiError::Status { status: status.as_u16(), message })
}
