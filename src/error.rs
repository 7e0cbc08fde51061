//! Error types for the jobgate service.

use serde::Serialize;
use thiserror::Error;

/// Main error type for jobgate operations.
#[derive(Error, Debug)]
pub enum JobgateError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("Server error: {0}")]
    Server(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<::config::ConfigError> for JobgateError {
    fn from(e: ::config::ConfigError) -> Self {
        JobgateError::Config(e.to_string())
    }
}

/// Result type alias for jobgate operations.
pub type Result<T> = std::result::Result<T, JobgateError>;

/// A client sent more requests than its policy admits in the current window.
///
/// This is an expected outcome, not a fault. It carries everything the HTTP
/// layer needs to build a 429 response.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message}")]
#[serde(rename_all = "camelCase")]
pub struct RateLimitExceeded {
    /// The policy's rejection text
    #[serde(skip)]
    pub message: String,
    /// Seconds until the next admissible request
    pub retry_after: u64,
    /// Requests admitted per window
    pub limit: u64,
    /// Window length in milliseconds
    pub window_ms: u64,
}
