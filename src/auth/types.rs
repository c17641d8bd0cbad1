// Authentication types and wire DTOs

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::jwt;

/// Current time as epoch milliseconds
pub(crate) fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Credential pair used to obtain tokens from the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Public identifier (username for password auth)
    pub username: String,
    /// Secret
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Authentication method tag sent in the token issuance request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    UserPassword,
}

/// Token issuance request
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest {
    pub auth_method: AuthMethod,
    /// Public identifier of the caller
    pub public_key: String,
    pub client_name: String,
    /// Epoch milliseconds at request creation
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,
    /// Provider-specific payload, opaque to the client
    pub provider_data: serde_json::Value,
}

impl TokenRequest {
    /// Build a password-auth issuance request
    pub fn user_password(
        credentials: &Credentials,
        client_name: &str,
        permissions: Option<Vec<String>>,
    ) -> Self {
        Self {
            auth_method: AuthMethod::UserPassword,
            public_key: credentials.username.clone(),
            client_name: client_name.to_string(),
            timestamp: now_ms(),
            permissions,
            provider_data: serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }),
        }
    }
}

/// Token refresh request
///
/// Carries both tokens: the node matches the refresh token against the
/// access token it was issued with.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshTokenRequest {
    pub access_token: String,
    pub refresh_token: String,
}

/// Token pair returned by the issuance and refresh endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
}

/// Response envelope used by all node endpoints
///
/// The node wraps every successful payload in `{"data": ...}`. Anything
/// else is rejected at the boundary rather than probed for alternatives.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

/// Stored token state
///
/// Replaced atomically as a whole on every successful authenticate/refresh,
/// never mutated field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch milliseconds after which the access token is invalid
    pub expires_at: i64,
}

impl TokenData {
    /// Build token state from an issuance/refresh response
    ///
    /// `expires_at` comes from the JWT `exp` claim when the access token is
    /// JWT-shaped, otherwise from a fixed 24-hour fallback applied now.
    pub fn from_response(response: TokenResponse) -> Self {
        let expires_at = jwt::parse_expiry(&response.access_token)
            .unwrap_or_else(|| now_ms() + jwt::DEFAULT_TOKEN_TTL_MS);

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        }
    }

    /// Check whether the token is still usable at `now_ms` with the given
    /// expiry buffer: fresh iff `now < expires_at - buffer`
    pub fn is_fresh(&self, now_ms: i64, buffer_ms: i64) -> bool {
        now_ms < self.expires_at - buffer_ms
    }
}
