//! Text completion errors

use thiserror::Error;

/// Errors raised while talking to the completion API
#[derive(Debug, Error)]
pub enum CompletionError {
    /// The API could not be reached
    #[error("Connection to completion API failed: {0}")]
    ConnectionFailed(String),

    /// The API did not answer in time
    #[error("Completion API timed out after {secs}s")]
    Timeout {
        /// Configured timeout in seconds
        secs: u64,
    },

    /// The request could not be sent or read
    #[error("Completion request failed: {0}")]
    RequestFailed(String),

    /// The API answered with a non-success status
    #[error("Completion API returned {status}: {body}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Response body, or a placeholder when empty
        body: String,
    },

    /// The API answered 200 with an unexpected payload
    #[error("Invalid completion response: {0}")]
    InvalidResponse(String),

    /// Client could not be built from configuration
    #[error("Completion client misconfigured: {0}")]
    Configuration(String),

    /// Caller supplied parameters are out of range
    #[error("Invalid completion request: {0}")]
    InvalidRequest(String),
}

impl CompletionError {
    /// Whether the failure is transient and worth another attempt
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectionFailed(_) | Self::Timeout { .. })
    }
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::ConnectionFailed(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}
