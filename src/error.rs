// Error handling module
// Defines the client error taxonomy and the clonable auth-lifecycle errors

use thiserror::Error;

/// Errors that can occur while talking to a Mero node
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed at the transport level
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected schema
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Node API returned a non-success status
    #[error("Node API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Response parsed but violated an invariant (e.g. empty token fields)
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token lifecycle error
    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Token lifecycle errors
///
/// Kept separate from [`ClientError`] and `Clone` because a single refresh
/// operation may have many concurrent waiters, each of which receives the
/// same error value. Underlying causes are carried as rendered messages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    /// `authenticate()` was called with no credentials available,
    /// neither as an argument nor as a configured default
    #[error("No credentials provided: supply credentials or configure a default")]
    NoCredentialsProvided,

    /// The token issuance call failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Refresh was attempted without a refresh token present
    #[error("No refresh token available: authenticate first")]
    NoRefreshToken,

    /// The refresh call failed; stored tokens have been cleared
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
