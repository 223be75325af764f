//! Core Error Types
//!
//! Defines the foundational error types used across the Control Sweep workspace.
//! These error types only depend on thiserror + std + the serialization crates,
//! keeping the core crate lightweight.
//!
//! The application crate wraps these in `AppError` together with HTTP, browser
//! and filesystem failures.

use thiserror::Error;

/// Core error type for the Control Sweep workspace.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Parse errors (policy files, surface catalogs, control attributes)
    #[error("Parse error: {0}")]
    Parse(String),

    /// The UI driver failed to navigate, query or act on the page
    #[error("Browser error: {0}")]
    Browser(String),

    /// A backend endpoint was unreachable or returned an unexpected payload
    #[error("Backend error: {0}")]
    Backend(String),

    /// A bounded wait elapsed
    #[error("Timed out: {0}")]
    Timeout(String),

    /// A mutation was not durably persisted or the UI disagrees with it
    #[error("Verification failed: {0}")]
    Verification(String),

    /// A mirror of a verified setting renders a different value
    #[error("Propagation mismatch: {0}")]
    Propagation(String),

    /// The retrieval oracle flagged a functional regression
    #[error("Retrieval regression: {0}")]
    Regression(String),

    /// Required operational metrics are missing
    #[error("Metrics check failed: {0}")]
    Metrics(String),

    /// A global precondition failed; the run must stop
    #[error("Preflight failed: {0}")]
    Preflight(String),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for core errors
pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a browser error
    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a verification error
    pub fn verification(msg: impl Into<String>) -> Self {
        Self::Verification(msg.into())
    }

    /// Create a propagation error
    pub fn propagation(msg: impl Into<String>) -> Self {
        Self::Propagation(msg.into())
    }

    /// Create a regression error
    pub fn regression(msg: impl Into<String>) -> Self {
        Self::Regression(msg.into())
    }

    /// Create a metrics error
    pub fn metrics(msg: impl Into<String>) -> Self {
        Self::Metrics(msg.into())
    }

    /// Create a preflight error
    pub fn preflight(msg: impl Into<String>) -> Self {
        Self::Preflight(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error must abort the whole run rather than one control.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CoreError::Preflight(_))
    }
}

/// Convert CoreError to a string
impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
