// Token lifecycle manager
// Owns the stored token pair and coordinates at most one in-flight refresh

use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use super::storage::TokenStorage;
use super::types::{now_ms, Credentials, RefreshTokenRequest, TokenData, TokenRequest};
use super::AuthApi;
use crate::error::{AuthError, Result};

/// Default expiry buffer: a token within 5 minutes of expiry is refreshed
pub const DEFAULT_REFRESH_BUFFER_MS: i64 = 5 * 60 * 1000;

/// The one outstanding refresh operation, shared by every concurrent waiter
type RefreshFuture = Shared<BoxFuture<'static, std::result::Result<TokenData, AuthError>>>;

/// Token manager
///
/// Hands the transport a currently-valid access token on demand, refreshing
/// transparently when the held token is stale. Concurrent callers that
/// discover a stale token at the same time all await the same refresh; only
/// one network call goes out.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<ManagerState>,
}

struct ManagerState {
    /// External Auth service collaborator
    auth: Arc<dyn AuthApi>,

    /// Client name reported in issuance requests
    client_name: String,

    /// Default credentials for `authenticate()` and forced re-auth
    default_credentials: Option<Credentials>,

    /// Permission list requested at issuance
    permissions: Option<Vec<String>>,

    /// Refresh when within this many milliseconds of expiry
    refresh_buffer_ms: i64,

    /// Current token pair; replaced as a whole, never partially mutated
    tokens: RwLock<Option<TokenData>>,

    /// In-flight refresh marker; `Some` only between refresh start and completion
    in_flight: Mutex<Option<RefreshFuture>>,

    /// Optional persistence side channel
    storage: Option<Arc<dyn TokenStorage>>,

    /// Whether persisted tokens have been loaded (or ruled out) yet
    storage_loaded: AtomicBool,
}

impl TokenManager {
    /// Create a new token manager
    ///
    /// `storage` is optional and best-effort: persisted tokens are loaded
    /// lazily on first read, and write failures never affect the in-memory
    /// state.
    pub fn new(
        auth: Arc<dyn AuthApi>,
        client_name: impl Into<String>,
        default_credentials: Option<Credentials>,
        permissions: Option<Vec<String>>,
        storage: Option<Arc<dyn TokenStorage>>,
        refresh_buffer_ms: i64,
    ) -> Self {
        let storage_loaded = AtomicBool::new(storage.is_none());

        Self {
            inner: Arc::new(ManagerState {
                auth,
                client_name: client_name.into(),
                default_credentials,
                permissions,
                refresh_buffer_ms,
                tokens: RwLock::new(None),
                in_flight: Mutex::new(None),
                storage,
                storage_loaded,
            }),
        }
    }

    /// Whether `authenticate()` can be called without explicit credentials
    pub fn has_default_credentials(&self) -> bool {
        self.inner.default_credentials.is_some()
    }

    /// Authenticate with the configured default credentials
    ///
    /// Fails with [`AuthError::NoCredentialsProvided`] before any network
    /// call when no default was configured.
    pub async fn authenticate(&self) -> Result<TokenData> {
        let credentials = self
            .inner
            .default_credentials
            .clone()
            .ok_or(AuthError::NoCredentialsProvided)?;
        self.authenticate_as(&credentials).await
    }

    /// Authenticate with explicit credentials
    ///
    /// On success the resulting token pair replaces any prior state. On
    /// failure nothing is stored.
    pub async fn authenticate_as(&self, credentials: &Credentials) -> Result<TokenData> {
        let request = TokenRequest::user_password(
            credentials,
            &self.inner.client_name,
            self.inner.permissions.clone(),
        );

        debug!(public_key = %request.public_key, "Requesting token issuance");

        let response = self
            .inner
            .auth
            .issue_token(&request)
            .await
            .map_err(|e| AuthError::AuthenticationFailed(e.to_string()))?;

        let tokens = TokenData::from_response(response);
        store(&self.inner, Some(tokens.clone())).await;

        debug!(expires_at = tokens.expires_at, "Authenticated");
        Ok(tokens)
    }

    /// Get a token valid for at least the configured buffer, refreshing if
    /// necessary
    ///
    /// `Ok(None)` means no token is held at all; the caller proceeds
    /// unauthenticated. This is the sole read path for attaching bearer
    /// tokens to outgoing requests.
    pub async fn get_valid_token(&self) -> Result<Option<TokenData>> {
        self.hydrate_if_needed().await;

        {
            let guard = self.inner.tokens.read().await;
            match guard.as_ref() {
                None => return Ok(None),
                Some(tokens) if tokens.is_fresh(now_ms(), self.inner.refresh_buffer_ms) => {
                    return Ok(Some(tokens.clone()))
                }
                Some(_) => {}
            }
        }

        let refreshed = self.refresh().await?;
        Ok(Some(refreshed))
    }

    /// Unconditionally discard stored tokens
    pub async fn clear_token(&self) {
        store(&self.inner, None).await;
    }

    /// Whether a token pair is currently held; expiry is not checked
    pub async fn is_authenticated(&self) -> bool {
        self.hydrate_if_needed().await;
        self.inner.tokens.read().await.is_some()
    }

    /// Snapshot of the stored token pair, for inspection only
    ///
    /// The snapshot carries no validity guarantee; use
    /// [`Self::get_valid_token`] to obtain a token for a request.
    pub async fn token_data(&self) -> Option<TokenData> {
        self.hydrate_if_needed().await;
        self.inner.tokens.read().await.clone()
    }

    /// Install a token pair directly, bypassing the auth endpoints
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn set_tokens_for_testing(&self, tokens: TokenData) {
        store(&self.inner, Some(tokens)).await;
    }

    /// Single-flight refresh: join the outstanding operation or start one
    async fn refresh(&self) -> std::result::Result<TokenData, AuthError> {
        let operation = {
            let mut in_flight = self.inner.in_flight.lock().await;
            match in_flight.as_ref().cloned() {
                Some(operation) => operation,
                None => {
                    // A refresh may have finished while this caller was
                    // waiting on the marker lock; re-check before starting
                    // another one.
                    if let Some(tokens) = self.inner.tokens.read().await.as_ref() {
                        if tokens.is_fresh(now_ms(), self.inner.refresh_buffer_ms) {
                            return Ok(tokens.clone());
                        }
                    }

                    let operation: RefreshFuture =
                        run_refresh(Arc::clone(&self.inner)).boxed().shared();
                    *in_flight = Some(operation.clone());
                    operation
                }
            }
        };

        // The marker holds the operation itself, so even if every original
        // waiter is cancelled a later caller picks it up here and drives it
        // to completion instead of waiting on a dead handle.
        operation.await
    }

    /// Load persisted tokens on first read, never overwriting live state
    async fn hydrate_if_needed(&self) {
        if self.inner.storage_loaded.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(storage) = &self.inner.storage else {
            return;
        };

        match storage.get().await {
            Ok(Some(tokens)) => {
                let mut guard = self.inner.tokens.write().await;
                if guard.is_none() {
                    debug!("Restored persisted tokens");
                    *guard = Some(tokens);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load persisted tokens"),
        }
    }
}

/// Body of the one in-flight refresh operation
///
/// State is updated before the marker is released so a caller arriving
/// after completion either joins this operation or observes its outcome,
/// never a half-updated pair.
async fn run_refresh(state: Arc<ManagerState>) -> std::result::Result<TokenData, AuthError> {
    let result = perform_refresh(&state).await;

    match &result {
        Ok(tokens) => {
            debug!(expires_at = tokens.expires_at, "Token refreshed");
            store(&state, Some(tokens.clone())).await;
        }
        Err(AuthError::NoRefreshToken) => {}
        Err(e) => {
            // The refresh token is unusable; degrade to unauthenticated
            // rather than retrying with it forever.
            warn!(error = %e, "Token refresh failed, clearing stored tokens");
            store(&state, None).await;
        }
    }

    *state.in_flight.lock().await = None;
    result
}

async fn perform_refresh(state: &ManagerState) -> std::result::Result<TokenData, AuthError> {
    let current = state
        .tokens
        .read()
        .await
        .clone()
        .ok_or(AuthError::NoRefreshToken)?;
    if current.refresh_token.is_empty() {
        return Err(AuthError::NoRefreshToken);
    }

    let request = RefreshTokenRequest {
        access_token: current.access_token,
        refresh_token: current.refresh_token,
    };

    let response = state
        .auth
        .refresh_token(&request)
        .await
        .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

    Ok(TokenData::from_response(response))
}

/// Replace stored state atomically and write through to storage best-effort
async fn store(state: &ManagerState, tokens: Option<TokenData>) {
    {
        let mut guard = state.tokens.write().await;
        *guard = tokens.clone();
    }
    state.storage_loaded.store(true, Ordering::SeqCst);

    if let Some(storage) = &state.storage {
        let result = match &tokens {
            Some(tokens) => storage.set(tokens).await,
            None => storage.clear().await,
        };
        if let Err(e) = result {
            warn!(error = %e, "Token storage write failed; in-memory state remains authoritative");
        }
    }
}
