//! Text Completion - chat-completion proxy client
//!
//! Sends a single-turn prompt to an OpenAI-compatible chat-completion API
//! and reports the generated text with token usage.
//!
//! Transient transport failures (connection errors and timeouts) are retried
//! with a fixed pause; API errors are returned straight away.
//!
//! # Example
//!
//! ```ignore
//! use text_completion::{CompletionClient, CompletionConfig, CompletionPort, CompletionRequest};
//!
//! let client = CompletionClient::new(CompletionConfig::default())?;
//! let response = client.complete(&CompletionRequest::new("Hola")).await?;
//! println!("{} ({} tokens)", response.text, response.completion_tokens);
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod ports;
pub mod retry;
pub mod types;

pub use client::CompletionClient;
pub use config::CompletionConfig;
pub use error::CompletionError;
pub use ports::CompletionPort;
pub use retry::{RetryPolicy, RetryResult, Retryable, retry_fixed, with_retry};
pub use types::{CompletionRequest, CompletionResponse, ResolvedRequest};
