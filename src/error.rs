//! Error types for wikibridge

use thiserror::Error;

/// Result type alias for wikibridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Main error type for wikibridge
#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Wiki API error ({code}): {message}")]
    WikiApi { code: i64, message: String },

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Object storage error: {0}")]
    Storage(String),

    #[error("Document index error: {0}")]
    Index(String),

    #[error("Notification parse error: {0}")]
    Notification(String),

    #[error("No wiki space named '{0}'")]
    SpaceNotFound(String),

    #[error("Document has no content: {0}")]
    EmptyDocument(String),

    #[error("Object too large: {size} bytes (limit {limit})")]
    Oversize { size: u64, limit: u64 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Check if error is a rate-limit condition (backed off with jitter)
    pub fn is_rate_limit(&self) -> bool {
        match self {
            BridgeError::RateLimited(_) => true,
            BridgeError::Http(e) => {
                e.status() == Some(reqwest::StatusCode::TOO_MANY_REQUESTS)
            }
            _ => false,
        }
    }

    /// Check if error is retryable at all
    pub fn is_retryable(&self) -> bool {
        self.is_rate_limit()
            || matches!(
                self,
                BridgeError::Http(_) | BridgeError::Storage(_) | BridgeError::Transport(_)
            )
    }
}
