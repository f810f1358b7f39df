//! Completion request and response types

use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::CompletionError;

/// Prompt plus optional generation parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Prompt text
    pub text: String,
    /// Sampling temperature in `[0, 1]`
    pub temperature: Option<f32>,
    /// Upper bound on generated tokens
    pub max_tokens: Option<u32>,
    /// Model override
    pub model: Option<String>,
}

impl CompletionRequest {
    /// Create a request with default parameters
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    /// Set the sampling temperature
    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the token limit
    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Check parameter ranges
    ///
    /// # Errors
    ///
    /// Returns `CompletionError::InvalidRequest` for blank text, a temperature
    /// outside `[0, 1]` or a zero token limit.
    pub fn validate(&self) -> Result<(), CompletionError> {
        if self.text.trim().is_empty() {
            return Err(CompletionError::InvalidRequest(
                "text must not be empty".to_string(),
            ));
        }

        if let Some(t) = self.temperature {
            if !(0.0..=1.0).contains(&t) {
                return Err(CompletionError::InvalidRequest(
                    "temperature must be between 0.0 and 1.0".to_string(),
                ));
            }
        }

        if self.max_tokens == Some(0) {
            return Err(CompletionError::InvalidRequest(
                "max_tokens must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Fill unset parameters from configuration
    #[must_use]
    pub fn resolve(&self, config: &CompletionConfig) -> ResolvedRequest {
        ResolvedRequest {
            text: self.text.clone(),
            temperature: self.temperature.unwrap_or(config.default_temperature),
            max_tokens: self.max_tokens.unwrap_or(config.default_max_tokens),
            model: self.model.clone().unwrap_or_else(|| config.model.clone()),
        }
    }
}

/// Request with every parameter decided
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    /// Prompt text
    pub text: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Upper bound on generated tokens
    pub max_tokens: u32,
    /// Model identifier
    pub model: String,
}

/// Generated text plus usage metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text
    pub text: String,
    /// Model that produced it
    pub model: String,
    /// Tokens in the prompt
    pub prompt_tokens: u32,
    /// Tokens generated
    pub completion_tokens: u32,
    /// Wall time in seconds, retries included
    pub elapsed_secs: f64,
}
