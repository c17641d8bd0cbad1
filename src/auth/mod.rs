// Authentication module
// Token lifecycle, JWT expiry decoding, and optional persistence

pub mod jwt;
pub mod manager;
pub mod storage;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::{RefreshTokenRequest, TokenRequest, TokenResponse};

pub use manager::{TokenManager, DEFAULT_REFRESH_BUFFER_MS};
pub use storage::{FileTokenStorage, MemoryTokenStorage, TokenStorage};
pub use types::{AuthMethod, Credentials, TokenData};

/// The node's Auth service, as seen by the token manager
///
/// Both calls go out without an Authorization header; they are the only two
/// endpoints the client ever hits unauthenticated. The trait seam exists so
/// the manager can be driven by a mock in tests and by [`crate::transport::AuthEndpoints`]
/// in production.
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Exchange credentials for a token pair
    async fn issue_token(&self, request: &TokenRequest) -> Result<TokenResponse>;

    /// Exchange the current token pair for a fresh one
    async fn refresh_token(&self, request: &RefreshTokenRequest) -> Result<TokenResponse>;
}
