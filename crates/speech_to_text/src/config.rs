//! Configuration for the transcription service

use std::path::PathBuf;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Configuration for audio ingestion and transcription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Engine selector: `local` or `remote` (`google` is accepted as an alias)
    #[serde(default = "default_engine")]
    pub engine: String,

    /// Credential for the remote engine
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Remote recognition endpoint
    #[serde(default = "default_remote_endpoint")]
    pub remote_endpoint: String,

    /// Hosted backend used by the local engine
    #[serde(default = "default_local_endpoint")]
    pub local_endpoint: String,

    /// Optional key appended to local backend requests
    #[serde(default, skip_serializing)]
    pub local_api_key: Option<SecretString>,

    /// Maximum upload size in megabytes
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// Comma separated list of accepted extensions
    #[serde(default = "default_allowed_formats")]
    pub allowed_formats: String,

    /// Recognition timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory for scratch files (system temp dir when unset)
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    /// FFmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,

    /// SoX binary
    #[serde(default = "default_sox_path")]
    pub sox_path: String,

    /// Keep the persisted original upload after the request finishes
    #[serde(default = "default_retain_original_upload")]
    pub retain_original_upload: bool,

    /// Pause between scratch file removal attempts in milliseconds
    #[serde(default = "default_removal_retry_delay_ms")]
    pub removal_retry_delay_ms: u64,
}

fn default_engine() -> String {
    "local".to_string()
}

fn default_remote_endpoint() -> String {
    "https://speech.googleapis.com/v1/speech:recognize".to_string()
}

fn default_local_endpoint() -> String {
    "http://www.google.com/speech-api/v2/recognize".to_string()
}

const fn default_max_file_size_mb() -> u64 {
    10
}

fn default_allowed_formats() -> String {
    "wav,mp3,ogg,webm".to_string()
}

const fn default_timeout_secs() -> u64 {
    30
}

fn default_ffmpeg_path() -> String {
    "ffmpeg".to_string()
}

fn default_sox_path() -> String {
    "sox".to_string()
}

const fn default_retain_original_upload() -> bool {
    true
}

const fn default_removal_retry_delay_ms() -> u64 {
    1000
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            engine: default_engine(),
            api_key: None,
            remote_endpoint: default_remote_endpoint(),
            local_endpoint: default_local_endpoint(),
            local_api_key: None,
            max_file_size_mb: default_max_file_size_mb(),
            allowed_formats: default_allowed_formats(),
            timeout_secs: default_timeout_secs(),
            scratch_dir: None,
            ffmpeg_path: default_ffmpeg_path(),
            sox_path: default_sox_path(),
            retain_original_upload: default_retain_original_upload(),
            removal_retry_delay_ms: default_removal_retry_delay_ms(),
        }
    }
}

impl SpeechConfig {
    /// Create a config rooted in a test scratch directory
    #[cfg(test)]
    pub fn test(scratch_dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(scratch_dir.into()),
            removal_retry_delay_ms: 10,
            ..Default::default()
        }
    }

    /// Configured allow-list, trimmed and lower-cased
    #[must_use]
    pub fn allowed_formats(&self) -> Vec<String> {
        self.allowed_formats
            .split(',')
            .map(|f| f.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|f| !f.is_empty())
            .collect()
    }

    /// Scratch directory, falling back to the system temp dir
    #[must_use]
    pub fn scratch_dir(&self) -> PathBuf {
        self.scratch_dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    /// Recognition timeout
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Remote credential, empty when unset
    #[must_use]
    pub fn api_key(&self) -> &str {
        self.api_key
            .as_ref()
            .map(|key| key.expose_secret())
            .unwrap_or_default()
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.engine.trim().is_empty() {
            return Err("Transcription engine must not be empty".to_string());
        }

        if self.max_file_size_mb == 0 {
            return Err("Max file size must be greater than 0".to_string());
        }

        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }

        if self.ffmpeg_path.trim().is_empty() {
            return Err("FFmpeg path must not be empty".to_string());
        }

        Ok(())
    }
}
