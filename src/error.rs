//! Error types for the lifelog crate

use thiserror::Error;

/// Main error type for lifelog operations
#[derive(Error, Debug)]
pub enum LifelogError {
    /// Invalid or incomplete configuration
    #[error("configuration error: {0}")]
    Config(String),

    /// No usable access token; the caller must run the interactive flow first
    #[error("not authenticated: run `lifelog auth` first")]
    NotAuthenticated,

    /// Interactive authentication did not complete
    #[error("authentication failed; see the messages above for details")]
    AuthenticationFailed,

    /// Microsoft Graph rejected a request
    #[error("Microsoft Graph request failed ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, as far as it could be read
        message: String,
    },

    /// A required resource is missing (file, notebook, section, ...)
    #[error("not found: {0}")]
    NotFound(String),

    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for lifelog operations
pub type Result<T> = std::result::Result<T, LifelogError>;

impl LifelogError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a Graph API error
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
}
