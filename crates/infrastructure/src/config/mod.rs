//! Application configuration
//!
//! Sources, lowest precedence first:
//! 1. built-in defaults
//! 2. `config.toml` in the working directory (optional)
//! 3. prefixed variables such as `VOZ__SPEECH__ENGINE` or `VOZ__SERVER__PORT`
//! 4. the flat variable names the services have always read
//!    (`MOTOR_TRANSCRIPCION`, `API_PUERTO`, `DEEPSEEK_API_KEY`, ...)

mod server;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use speech_to_text::SpeechConfig;
use text_completion::CompletionConfig;
use tracing::debug;

pub use server::ServerConfig;

/// Prefix for structured environment variables
pub const ENV_PREFIX: &str = "VOZ";

/// Separator between prefix, section and field
pub const ENV_SEPARATOR: &str = "__";

/// Flat environment variables and the config key each one sets
pub const LEGACY_ENV_KEYS: [(&str, &str); 16] = [
    ("MOTOR_TRANSCRIPCION", "speech.engine"),
    ("API_CLAVE", "speech.api_key"),
    ("TAMANO_MAX_ARCHIVO", "speech.max_file_size_mb"),
    ("FORMATOS_PERMITIDOS", "speech.allowed_formats"),
    ("TIEMPO_ESPERA", "speech.timeout_secs"),
    ("API_HOST", "server.host"),
    ("API_PUERTO", "server.port"),
    ("NIVEL_LOG", "server.log_level"),
    ("DEEPSEEK_API_KEY", "completion.api_key"),
    ("DEEPSEEK_API_URL", "completion.api_url"),
    ("DEEPSEEK_MODELO", "completion.model"),
    ("TEMPERATURA_PREDETERMINADA", "completion.default_temperature"),
    ("MAX_TOKENS_PREDETERMINADO", "completion.default_max_tokens"),
    ("REQUEST_TIMEOUT", "completion.timeout_secs"),
    ("MAX_REINTENTOS", "completion.max_retries"),
    ("TIEMPO_ENTRE_REINTENTOS", "completion.retry_delay_secs"),
];

/// Which binary is loading the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Speech-to-text server
    Transcription,
    /// Text completion proxy
    Completion,
}

impl Service {
    /// Port used when nothing else is configured
    #[must_use]
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Transcription => 5003,
            Self::Completion => 5001,
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Audio ingestion and transcription
    #[serde(default)]
    pub speech: SpeechConfig,

    /// Chat-completion proxy
    #[serde(default)]
    pub completion: CompletionConfig,
}

impl AppConfig {
    /// Load configuration from file and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value has the wrong type.
    pub fn load(service: Service) -> Result<Self, config::ConfigError> {
        let env: HashMap<String, String> = std::env::vars().collect();
        Self::load_from(service, Some("config"), &env)
    }

    /// Load configuration from an optional file and an explicit environment
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or a value has the wrong type.
    pub fn load_from(
        service: Service,
        file: Option<&str>,
        env: &HashMap<String, String>,
    ) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder()
            // Start with defaults
            .set_default("server.port", i64::from(service.default_port()))?;

        if let Some(file) = file {
            builder = builder.add_source(config::File::with_name(file).required(false));
        }

        // Override with prefixed environment variables (e.g., VOZ__SPEECH__ENGINE)
        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator(ENV_SEPARATOR)
                .list_separator(",")
                .with_list_parse_key("server.allowed_origins")
                .try_parsing(true)
                .source(Some(env.clone().into_iter().collect())),
        );

        // Flat names win over everything else
        for (var, key) in LEGACY_ENV_KEYS {
            let value = env.get(var).filter(|v| !v.trim().is_empty()).cloned();
            if value.is_some() {
                debug!(var, key, "Applying legacy environment variable");
            }
            builder = builder.set_override_option(key, value)?;
        }

        builder.build()?.try_deserialize()
    }

    /// Validate every section
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()?;
        self.speech.validate()?;
        self.completion.validate()
    }
}
