// Client wrapper
// Thin factory wiring auth endpoints -> token manager -> transport

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::storage::TokenStorage;
use crate::auth::types::{Credentials, TokenData};
use crate::auth::TokenManager;
use crate::config::ClientConfig;
use crate::error::Result;
use crate::transport::{AuthEndpoints, HttpTransport};

/// Client for a single Mero node
///
/// One instance per application context; construct it explicitly and pass
/// it to consumers rather than holding a process-wide singleton. Business
/// endpoints are reached through the generic passthrough methods with
/// caller-supplied DTOs.
pub struct Client {
    transport: HttpTransport,
    tokens: TokenManager,
}

impl Client {
    /// Create a client without token persistence
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a client that persists tokens through the given storage
    pub fn with_storage(config: ClientConfig, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        Self::build(config, Some(storage))
    }

    fn build(config: ClientConfig, storage: Option<Arc<dyn TokenStorage>>) -> Result<Self> {
        config.validate()?;

        let connect_timeout = Duration::from_secs(config.http_connect_timeout_secs);
        let request_timeout = Duration::from_secs(config.http_request_timeout_secs);

        let auth = Arc::new(AuthEndpoints::new(
            config.node_url.clone(),
            connect_timeout,
            request_timeout,
        )?);

        let tokens = TokenManager::new(
            auth,
            config.client_name.clone(),
            config.credentials.clone(),
            config.permissions.clone(),
            storage,
            config.refresh_buffer_ms,
        );

        let transport = HttpTransport::new(
            config.node_url,
            tokens.clone(),
            config.http_max_connections,
            connect_timeout,
            request_timeout,
            config.http_max_retries,
        )?;

        Ok(Self { transport, tokens })
    }

    /// Authenticate with the configured default credentials
    pub async fn authenticate(&self) -> Result<TokenData> {
        self.tokens.authenticate().await
    }

    /// Authenticate with explicit credentials
    pub async fn authenticate_as(&self, credentials: &Credentials) -> Result<TokenData> {
        self.tokens.authenticate_as(credentials).await
    }

    /// Discard the session, locally and from storage
    pub async fn logout(&self) {
        self.tokens.clear_token().await;
    }

    /// Whether a token pair is held; expiry is not checked
    pub async fn is_authenticated(&self) -> bool {
        self.tokens.is_authenticated().await
    }

    /// The underlying token manager, for advanced use
    pub fn token_manager(&self) -> &TokenManager {
        &self.tokens
    }

    // Generic passthrough to node endpoints. Response payloads are opaque
    // to the client; callers bring their own DTOs.

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.transport.get(path).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.transport.post(path, body).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.transport.put(path, body).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.transport.delete(path).await
    }
}
