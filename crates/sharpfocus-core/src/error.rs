//! Error types for SharpFocus

use thiserror::Error;

/// Result type alias for SharpFocus operations
pub type FocusResult<T> = Result<T, FocusError>;

/// Main error type for SharpFocus
#[derive(Error, Debug)]
pub enum FocusError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Tab unreachable: {0}")]
    Unreachable(String),

    #[error("Injection failed: {0}")]
    Injection(String),

    #[error("Messaging error: {0}")]
    Messaging(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FocusError {
    /// Create a new storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a new unreachable-tab error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create a new injection error
    pub fn injection(msg: impl Into<String>) -> Self {
        Self::Injection(msg.into())
    }

    /// Create a new messaging error
    pub fn messaging(msg: impl Into<String>) -> Self {
        Self::Messaging(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the tab simply could not be reached.
    ///
    /// These are expected for privileged pages and tabs closed mid-operation.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable(_) | Self::Injection(_))
    }
}
