//! Error types for TaskWrap
//!
//! Errors shared by every layer. Work failures carried by state transitions
//! live in the task layer (`TaskError`).

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// TaskWrap error type
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ========================================================================
    // Execution
    // ========================================================================
    #[error("Cancellation handle already disposed")]
    Disposed,

    #[error("Cancelled")]
    Cancelled,

    // ========================================================================
    // External error conversion
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ========================================================================
    // Other
    // ========================================================================
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Errors caused by caller-supplied settings rather than runtime state
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Error::Config(_) | Error::InvalidInput(_))
    }

    /// Invalid progress range helper
    pub fn invalid_bounds(minimum: i32, maximum: i32) -> Self {
        Error::InvalidInput(format!(
            "progress minimum ({}) must not exceed maximum ({})",
            minimum, maximum
        ))
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Internal(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Internal(s.to_string())
    }
}
