//! Transcription engine implementations (adapters)

pub mod local;
pub mod remote;

use std::str::FromStr;

use crate::error::SpeechError;

pub use local::LocalEngine;
pub use remote::RemoteEngine;

/// Engine selector parsed from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// WAV reader plus hosted best-effort recognizer
    Local,
    /// Credentialed cloud recognition API
    Remote,
}

impl FromStr for EngineKind {
    type Err = SpeechError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "google" => Ok(Self::Remote),
            other => Err(SpeechError::EngineUnsupported(other.to_string())),
        }
    }
}
