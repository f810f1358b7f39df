//! Port definitions for the transcription pipeline
//!
//! Defines the traits (ports) that engines, conversion strategies and audio
//! probes must implement.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{EngineError, SpeechError};
use crate::types::{AudioFormat, TranscriptionOptions};

/// Port for transcription engines
///
/// Implementations turn a normalized audio file into text.
///
/// # Example
///
/// ```ignore
/// use speech_to_text::{TranscriptionEngine, TranscriptionOptions};
///
/// async fn run(engine: &dyn TranscriptionEngine, path: &Path) -> Result<String, EngineError> {
///     engine.transcribe(path, &TranscriptionOptions::default()).await
/// }
/// ```
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TranscriptionEngine: Send + Sync {
    /// Short identifier reported by the health endpoint
    fn name(&self) -> &'static str;

    /// Transcribe the audio file at `audio`
    ///
    /// # Errors
    ///
    /// Returns `EngineError` if the file cannot be read or recognition fails.
    async fn transcribe(
        &self,
        audio: &Path,
        options: &TranscriptionOptions,
    ) -> Result<String, EngineError>;
}

/// One way of turning an input file into the desired format
#[async_trait]
pub trait ConversionStrategy: Send + Sync {
    /// Identifier used in logs and conversion attempts
    fn id(&self) -> &'static str;

    /// Convert `input` into `output` encoded as `target`
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::ConversionFailed` if the conversion fails.
    async fn convert(
        &self,
        input: &Path,
        output: &Path,
        target: AudioFormat,
    ) -> Result<(), SpeechError>;
}

/// Checks whether a file can be opened by the transcription engine
pub trait AudioProbe: Send + Sync {
    /// Probe `path`, expected to be encoded as `format`
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::ConversionFailed` if the file cannot be opened.
    fn probe(&self, path: &Path, format: AudioFormat) -> Result<(), SpeechError>;
}
