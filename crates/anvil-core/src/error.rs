//! Error types for the collaborator boundary.
//!
//! Framework-level errors (decorators, loading, argument resolution) are
//! defined in `anvil-framework`.

use thiserror::Error;

/// Errors returned by the messaging platform behind a [`Bot`](crate::Bot).
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The bot is not connected.
    #[error("bot is not connected")]
    NotConnected,

    /// The API call timed out.
    #[error("API call timed out")]
    Timeout,

    /// The platform rejected the request.
    #[error("platform error ({code}): {message}")]
    Platform {
        /// Platform specific error code.
        code: i64,
        /// Human readable message.
        message: String,
    },

    /// Sending a message failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

impl ApiError {
    /// Creates a platform error.
    pub fn platform(code: i64, message: impl Into<String>) -> Self {
        Self::Platform {
            code,
            message: message.into(),
        }
    }
}

/// Result type for platform API calls.
pub type ApiResult<T> = Result<T, ApiError>;
