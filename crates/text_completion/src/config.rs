//! Configuration for the completion client

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Configuration for the chat-completion API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Bearer token for the API
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Base URL; `/v1/chat/completions` is appended
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model used when the request names none
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature used when the request sets none
    #[serde(default = "default_temperature")]
    pub default_temperature: f32,

    /// Token limit used when the request sets none
    #[serde(default = "default_max_tokens")]
    pub default_max_tokens: u32,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Total attempts for transient failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Pause between attempts in seconds
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,
}

fn default_api_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_model() -> String {
    "deepseek-chat".to_string()
}

const fn default_temperature() -> f32 {
    0.7
}

const fn default_max_tokens() -> u32 {
    1000
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_retry_delay_secs() -> u64 {
    1
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            default_temperature: default_temperature(),
            default_max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_delay_secs: default_retry_delay_secs(),
        }
    }
}

impl CompletionConfig {
    /// Request timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy derived from the attempt count and delay
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_secs(self.retry_delay_secs))
    }

    /// Bearer token, empty when unset
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .unwrap_or_default()
    }

    /// Chat completions endpoint
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.api_url.trim_end_matches('/'))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_url.trim().is_empty() {
            return Err("Completion API URL must not be empty".to_string());
        }

        if !(0.0..=1.0).contains(&self.default_temperature) {
            return Err("Default temperature must be between 0.0 and 1.0".to_string());
        }

        if self.default_max_tokens == 0 {
            return Err("Default max tokens must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.max_retries == 0 {
            return Err("Max retries must be at least 1".to_string());
        }

        Ok(())
    }
}
