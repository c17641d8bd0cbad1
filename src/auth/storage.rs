// Token persistence
// Optional write-through side channel; in-memory state stays authoritative

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::types::TokenData;

/// Pluggable persistence for the token pair
///
/// Implementations are best-effort: the manager logs their failures and
/// carries on with its in-memory state.
#[async_trait]
pub trait TokenStorage: Send + Sync {
    /// Load previously persisted tokens, if any
    async fn get(&self) -> Result<Option<TokenData>>;

    /// Persist the given tokens, replacing any previous value
    async fn set(&self, tokens: &TokenData) -> Result<()>;

    /// Remove persisted tokens
    async fn clear(&self) -> Result<()>;
}

/// In-memory storage, mainly for tests and short-lived processes
#[derive(Default)]
pub struct MemoryTokenStorage {
    tokens: RwLock<Option<TokenData>>,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStorage for MemoryTokenStorage {
    async fn get(&self) -> Result<Option<TokenData>> {
        Ok(self.tokens.read().await.clone())
    }

    async fn set(&self, tokens: &TokenData) -> Result<()> {
        *self.tokens.write().await = Some(tokens.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.tokens.write().await = None;
        Ok(())
    }
}

/// JSON-file storage under the platform data directory
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location: `<platform data dir>/mero/tokens.json`
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::data_dir().context("No platform data directory available")?;
        Ok(base.join("mero").join("tokens.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStorage for FileTokenStorage {
    async fn get(&self) -> Result<Option<TokenData>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read token file: {}", self.path.display()))
            }
        };

        let tokens = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse token file: {}", self.path.display()))?;
        Ok(Some(tokens))
    }

    async fn set(&self, tokens: &TokenData) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        // Write-then-rename so a crash mid-write never leaves a torn file
        let staging = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(tokens).context("Failed to serialize tokens")?;
        tokio::fs::write(&staging, &bytes)
            .await
            .with_context(|| format!("Failed to write token file: {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("Failed to replace token file: {}", self.path.display()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e)
                .with_context(|| format!("Failed to remove token file: {}", self.path.display())),
        }
    }
}
