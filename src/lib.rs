//! Mero Client
//!
//! Rust client SDK for Mero nodes: token lifecycle management with
//! single-flight refresh, and an authenticated HTTP transport for the
//! node's Admin API.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod transport;

pub use auth::{
    AuthApi, AuthMethod, Credentials, FileTokenStorage, MemoryTokenStorage, TokenData,
    TokenManager, TokenStorage, DEFAULT_REFRESH_BUFFER_MS,
};
pub use client::Client;
pub use config::{ClientConfig, DEFAULT_CLIENT_NAME, DEFAULT_NODE_URL};
pub use error::{AuthError, ClientError, Result};
pub use transport::{AuthEndpoints, HttpTransport};
