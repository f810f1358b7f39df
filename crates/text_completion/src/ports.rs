//! Port definitions for text completion

use async_trait::async_trait;

use crate::error::CompletionError;
use crate::types::{CompletionRequest, CompletionResponse};

/// Port for chat-completion backends
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionPort: Send + Sync {
    /// Model used when a request names none
    fn default_model(&self) -> String;

    /// Generate a completion for `request`
    ///
    /// # Errors
    ///
    /// Returns `CompletionError` if the request is invalid or the backend fails.
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionResponse, CompletionError>;
}
