// HTTP transport for the node API
// Attaches bearer tokens, handles 401 re-auth, retries idempotent requests

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use crate::auth::types::{ApiResponse, RefreshTokenRequest, TokenRequest, TokenResponse};
use crate::auth::{AuthApi, TokenManager};
use crate::error::{ClientError, Result};

/// HTTP-backed implementation of the node's Auth service
///
/// Holds its own connection pool and never attaches an Authorization
/// header; these are the client's only unauthenticated calls.
pub struct AuthEndpoints {
    client: Client,
    base_url: Url,
}

impl AuthEndpoints {
    pub fn new(base_url: Url, connect_timeout: Duration, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("Invalid endpoint path '{path}': {e}")))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let response = self.client.post(url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = response.bytes().await?;
        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl AuthApi for AuthEndpoints {
    async fn issue_token(&self, request: &TokenRequest) -> Result<TokenResponse> {
        tracing::debug!(public_key = %request.public_key, "POST auth/token");
        let tokens: TokenResponse = self.post_json("auth/token", request).await?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "Token issuance response is missing token fields".to_string(),
            ));
        }
        Ok(tokens)
    }

    async fn refresh_token(&self, request: &RefreshTokenRequest) -> Result<TokenResponse> {
        tracing::debug!("POST auth/refresh");
        let tokens: TokenResponse = self.post_json("auth/refresh", request).await?;

        if tokens.access_token.is_empty() || tokens.refresh_token.is_empty() {
            return Err(ClientError::InvalidResponse(
                "Token refresh response is missing token fields".to_string(),
            ));
        }
        Ok(tokens)
    }
}

/// Authenticated HTTP transport with retry logic
///
/// Asks the token manager for a valid token once per outgoing request. A
/// missing token sends the request unauthenticated; the node decides what
/// that caller may see.
pub struct HttpTransport {
    /// Shared HTTP client with connection pooling
    client: Client,

    base_url: Url,

    tokens: TokenManager,

    /// Maximum number of retries for retryable failures
    max_retries: u32,

    /// Base delay for exponential backoff (milliseconds)
    base_delay_ms: u64,
}

impl HttpTransport {
    pub fn new(
        base_url: Url,
        tokens: TokenManager,
        max_connections: usize,
        connect_timeout: Duration,
        request_timeout: Duration,
        max_retries: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url,
            tokens,
            max_retries,
            base_delay_ms: 1000,
        })
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::GET, path, None::<&()>).await
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.execute(Method::DELETE, path, None::<&()>).await
    }

    async fn execute<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize,
        T: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|e| ClientError::Config(format!("Invalid endpoint path '{path}': {e}")))?;
        let retryable = is_idempotent(&method);
        let mut attempt = 0;
        let mut reauthenticated = false;

        loop {
            let mut builder = self.client.request(method.clone(), url.clone());
            if let Some(tokens) = self.tokens.get_valid_token().await? {
                builder = builder.bearer_auth(&tokens.access_token);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            tracing::debug!(method = %method, url = %url, attempt = attempt + 1, "Sending request");

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let bytes = response.bytes().await?;
                        let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
                        return Ok(envelope.data);
                    }

                    if status == StatusCode::UNAUTHORIZED {
                        tracing::warn!(url = %url, "Received 401, clearing stored tokens");
                        self.tokens.clear_token().await;

                        // Never retry a 401 without forcing a fresh token first
                        if !reauthenticated && self.tokens.has_default_credentials() {
                            self.tokens.authenticate().await?;
                            reauthenticated = true;
                            continue;
                        }
                    } else if retryable
                        && attempt < self.max_retries
                        && matches!(status.as_u16(), 429 | 500..=599)
                    {
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            status = %status,
                            delay_ms = delay,
                            attempt = attempt + 1,
                            "Retrying after backoff"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }

                    let message = response.text().await.unwrap_or_default();
                    tracing::error!(
                        status = status.as_u16(),
                        url = %url,
                        response_body = %message,
                        "Request failed with error response"
                    );
                    return Err(ClientError::Api {
                        status: status.as_u16(),
                        message,
                    });
                }

                Err(e) => {
                    if retryable && attempt < self.max_retries && (e.is_timeout() || e.is_connect())
                    {
                        let delay = self.backoff_delay(attempt);
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay,
                            attempt = attempt + 1,
                            "Request error, retrying after backoff"
                        );
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(ClientError::Http(e));
                }
            }
        }
    }

    /// Exponential backoff with jitter to avoid synchronized retries
    fn backoff_delay(&self, attempt: u32) -> u64 {
        let delay = self.base_delay_ms * 2_u64.pow(attempt);
        let jitter = (delay as f64 * 0.1 * jitter_unit()) as u64;
        delay + jitter
    }
}

/// Methods safe to replay without a duplicate side effect
fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE
    )
}

/// Pseudo-random value in [0, 1), enough for retry jitter
fn jitter_unit() -> f64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hash, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    std::time::SystemTime::now().hash(&mut hasher);
    (hasher.finish() % 1000) as f64 / 1000.0
}
