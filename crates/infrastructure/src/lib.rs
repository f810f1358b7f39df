//! Infrastructure layer - configuration and tracing for the voice services
//!
//! Loads the layered [`AppConfig`] and installs the tracing subscriber.

pub mod config;
pub mod telemetry;

pub use config::{AppConfig, ENV_PREFIX, LEGACY_ENV_KEYS, ServerConfig, Service};
pub use telemetry::{LogFormat, TelemetryError, init_tracing};
