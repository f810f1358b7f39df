//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the configured level. Output is either
//! human-readable text or one JSON object per line.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// Structured JSON lines
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The level directive could not be parsed
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Offending directive
        filter: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed
    #[error("Failed to initialize tracing: {0}")]
    Init(String),
}

/// Build the filter from `RUST_LOG`, falling back to `level`
///
/// # Errors
///
/// Returns `TelemetryError::InvalidFilter` if `level` is not a valid directive.
pub fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let directive = level.trim().to_ascii_lowercase();
    EnvFilter::try_new(&directive).map_err(|e| TelemetryError::InvalidFilter {
        filter: directive,
        reason: e.to_string(),
    })
}

/// Install the global tracing subscriber
///
/// # Errors
///
/// Returns an error if the level is invalid or a subscriber is already set.
pub fn init_tracing(config: &ServerConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(&config.log_level)?;

    let registry = tracing_subscriber::registry().with(filter);

    let result = match config.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
    };
    result.map_err(|e| TelemetryError::Init(e.to_string()))?;

    info!(format = %config.log_format, level = %config.log_level, "Tracing initialized");
    Ok(())
}
