//! Persisted token cache for the Microsoft account session

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Leeway subtracted from the recorded expiry when judging token validity,
/// so a token is never handed out moments before the provider rejects it.
const EXPIRY_LEEWAY_SECS: u64 = 60;

/// Errors that can occur while reading or writing the token cache file
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Token endpoint response payload.
///
/// The cache persists the provider's payload wholesale: fields this client does
/// not interpret (account metadata, id tokens and so on) ride along in `extra`
/// so the stored session stays complete for the provider's own matching logic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenPayload {
    /// Access token for API calls
    pub access_token: String,

    /// Refresh token for obtaining new access tokens without user interaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Token type (usually "Bearer")
    #[serde(default = "default_token_type")]
    pub token_type: String,

    /// Token lifetime in seconds, as reported by the provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    /// Scopes granted to this token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    /// Provider fields the client does not interpret
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

/// A token payload plus the absolute expiry derived when it was obtained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// The provider payload, stored in full
    #[serde(flatten)]
    pub payload: TokenPayload,

    /// Unix timestamp when the access token expires, derived from `expires_in`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
}

impl TokenRecord {
    /// Wrap a freshly obtained payload, recording its absolute expiry now
    #[must_use]
    pub fn from_payload(payload: TokenPayload) -> Self {
        let expires_at = payload.expires_in.map(|secs| unix_now() + secs);
        Self {
            payload,
            expires_at,
        }
    }

    /// Check whether the cached access token should still be accepted.
    ///
    /// Tokens within [`EXPIRY_LEEWAY_SECS`] of their expiry count as expired.
    /// A record without a recorded expiry is treated as live.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => unix_now() + EXPIRY_LEEWAY_SECS >= expires_at,
            None => false,
        }
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

/// File-backed store for the single persisted token record.
///
/// One record per cache file; a new authentication overwrites the file
/// wholesale. An absent or unreadable cache means "no prior session" and is
/// never an error.
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenCache {
    /// Create a cache at the default path (platform config directory)
    #[must_use]
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lifelog");

        Self {
            path: config_dir.join("token_cache.json"),
        }
    }

    /// Create a cache at a custom path
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Get the cache file path
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the cached record.
    ///
    /// Returns `None` when the file does not exist or cannot be read or
    /// parsed; a corrupt cache is logged and then ignored.
    #[must_use]
    pub fn load(&self) -> Option<TokenRecord> {
        if !self.path.exists() {
            return None;
        }

        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("could not read token cache {}: {e}", self.path.display());
                return None;
            }
        };

        match serde_json::from_str(&content) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(
                    "token cache {} is not valid JSON, ignoring it: {e}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Overwrite the cache with `record`.
    ///
    /// The whole serialized record is written in a single operation, then the
    /// file is restricted to owner read/write on Unix. Callers treat a save
    /// failure as a logged warning: the in-memory token stays usable for the
    /// rest of the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or serialization fails.
    pub fn save(&self, record: &TokenRecord) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(record)?;
        std::fs::write(&self.path, &content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }
}
