// Client configuration
// Explicit values only; consumers wire their own env/file loading on top

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::manager::DEFAULT_REFRESH_BUFFER_MS;
use crate::auth::types::Credentials;
use crate::error::{ClientError, Result};

/// Default node address for local development
pub const DEFAULT_NODE_URL: &str = "http://localhost:2528";

/// Client name reported to the node when none is configured
pub const DEFAULT_CLIENT_NAME: &str = "mero-client-rs";

/// Configuration for [`crate::Client`]
///
/// Construct with [`ClientConfig::new`] (or [`ClientConfig::local`] for a
/// localhost node) and chain the setters for anything non-default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Node base URL
    pub node_url: Url,

    /// Client name sent in token issuance requests
    pub client_name: String,

    /// Default credentials for `authenticate()` and forced re-auth on 401
    pub credentials: Option<Credentials>,

    /// Permission list requested at token issuance
    pub permissions: Option<Vec<String>>,

    /// Refresh tokens within this many milliseconds of expiry
    pub refresh_buffer_ms: i64,

    // HTTP client
    pub http_max_connections: usize,
    pub http_connect_timeout_secs: u64,
    pub http_request_timeout_secs: u64,
    pub http_max_retries: u32,
}

impl ClientConfig {
    pub fn new(node_url: Url) -> Self {
        Self {
            node_url,
            client_name: DEFAULT_CLIENT_NAME.to_string(),
            credentials: None,
            permissions: None,
            refresh_buffer_ms: DEFAULT_REFRESH_BUFFER_MS,
            http_max_connections: 20,
            http_connect_timeout_secs: 10,
            http_request_timeout_secs: 30,
            http_max_retries: 3,
        }
    }

    /// Configuration for a node on the default local address
    pub fn local() -> Self {
        // The literal is valid; parse cannot fail
        Self::new(Url::parse(DEFAULT_NODE_URL).expect("default node URL parses"))
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = client_name.into();
        self
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    pub fn with_refresh_buffer_ms(mut self, refresh_buffer_ms: i64) -> Self {
        self.refresh_buffer_ms = refresh_buffer_ms;
        self
    }

    pub fn with_timeouts(mut self, connect_secs: u64, request_secs: u64) -> Self {
        self.http_connect_timeout_secs = connect_secs;
        self.http_request_timeout_secs = request_secs;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.http_max_retries = max_retries;
        self
    }

    /// Validate the configuration before any client is built from it
    pub fn validate(&self) -> Result<()> {
        let scheme = self.node_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ClientError::Config(format!(
                "Unsupported node URL scheme '{scheme}': only http and https are allowed"
            )));
        }
        if self.node_url.host_str().is_none() {
            return Err(ClientError::Config(
                "Node URL is missing a hostname".to_string(),
            ));
        }
        if self.client_name.is_empty() {
            return Err(ClientError::Config(
                "Client name must not be empty".to_string(),
            ));
        }
        if self.refresh_buffer_ms < 0 {
            return Err(ClientError::Config(
                "Refresh buffer must not be negative".to_string(),
            ));
        }
        Ok(())
    }
}
