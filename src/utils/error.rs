//! Error Handling
//!
//! Unified error types for the harness.
//! Uses thiserror for ergonomic error definitions.

use control_sweep_core::CoreError;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine errors (auto-converted from CoreError)
    #[error(transparent)]
    Core(#[from] CoreError),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Run-aborting precondition failures
    #[error("Preflight failed: {0}")]
    Preflight(String),

    /// Browser session errors
    #[error("Browser error: {0}")]
    Browser(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a preflight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Only preflight failures abort a run.
    pub fn is_fatal(&self) -> bool {
        match self {
            AppError::Preflight(_) => true,
            AppError::Core(core) => core.is_fatal(),
            _ => false,
        }
    }
}

/// Convert AppError to a string for ledger error fields
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
