//! Transcription service
//!
//! Selects the engine once at construction and folds every engine failure
//! into [`SpeechError`].

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::SpeechConfig;
use crate::engines::{EngineKind, LocalEngine, RemoteEngine};
use crate::error::SpeechError;
use crate::ports::TranscriptionEngine;
use crate::types::TranscriptionOptions;

/// Engine-agnostic transcription entry point
#[derive(Clone)]
pub struct TranscriptionService {
    engine: Arc<dyn TranscriptionEngine>,
}

impl fmt::Debug for TranscriptionService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranscriptionService")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl TranscriptionService {
    /// Build the service for the configured engine
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::EngineUnsupported` for unknown engine names and
    /// `SpeechError::EngineMisconfigured` if the engine cannot be built.
    pub fn from_config(config: &SpeechConfig) -> Result<Self, SpeechError> {
        let engine: Arc<dyn TranscriptionEngine> = match config.engine.parse::<EngineKind>()? {
            EngineKind::Local => Arc::new(LocalEngine::new(config)?),
            EngineKind::Remote => Arc::new(RemoteEngine::new(config)?),
        };

        info!(engine = engine.name(), "Transcription engine selected");
        Ok(Self { engine })
    }

    /// Wrap an existing engine
    #[must_use]
    pub fn with_engine(engine: Arc<dyn TranscriptionEngine>) -> Self {
        Self { engine }
    }

    /// Name of the active engine
    #[must_use]
    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Transcribe a normalized audio file
    ///
    /// # Errors
    ///
    /// Returns the engine failure as a `SpeechError`; unclassified failures
    /// become `SpeechError::TranscriptionFailed`.
    #[instrument(skip(self, options), fields(engine = self.engine.name(), audio = %audio.display()))]
    pub async fn transcribe(
        &self,
        audio: &Path,
        options: &TranscriptionOptions,
    ) -> Result<String, SpeechError> {
        self.engine
            .transcribe(audio, options)
            .await
            .map_err(|e| {
                let err = SpeechError::from(e);
                warn!(error = %err, "Transcription failed");
                err
            })
    }
}
