//! Login and registration against the auth endpoints.

use serde::{Deserialize, Serialize};

use super::ApiClient;
use crate::error::ApiError;

// ============================================================================
// WIRE TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub access_token: String,
    pub user_id: String,
    pub username: String,
    pub email: String,
}

// ============================================================================
// OPERATIONS
// ============================================================================

impl ApiClient {
    /// Exchange credentials for a bearer token. On success the token is
    /// stored on the client and used for all subsequent requests.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response, typically 401
    /// for bad credentials.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self.post_json("/auth/login", request).await?;
        self.set_token(response.access_token.clone());
        Ok(response)
    }

    /// Create an account. The backend logs the new user in, so the
    /// returned token is stored just like [`login`](Self::login).
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::Status`] on a non-2xx response, typically 409
    /// for a taken username.
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, ApiError> {
        let response: AuthResponse = self.post_json("/auth/register", request).await?;
        self.set_token(response.access_token.clone());
        Ok(response)
    }

    /// Drop the stored token. Purely local, the backend keeps no session.
    pub fn logout(&self) {
        *self.token.lock().expect("token lock") = None;
    }
}
