//! Audio normalization cascade
//!
//! Converts an arbitrary upload into a file the transcription engine can
//! read. Strategies are tried in order and each output is checked with an
//! [`AudioProbe`]; the first output that passes wins.
//!
//! # Cascade
//!
//! 1. [`DecodeStrategy`] - in-process decode to 44.1 kHz mono s16 WAV
//! 2. [`TranscoderStrategy`] - FFmpeg to 16 kHz mono s16 WAV
//! 3. [`ExternalToolStrategy`] - SoX, or bit-exact FFmpeg without SoX

mod decode;
mod probe;
mod tools;

use std::ffi::OsStr;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

pub use decode::{DECODE_SAMPLE_RATE, DecodeStrategy};
pub use probe::EngineAudioProbe;
pub use tools::{ExternalToolStrategy, TRANSCODE_SAMPLE_RATE, TranscoderStrategy};

use crate::config::SpeechConfig;
use crate::error::SpeechError;
use crate::ports::{AudioProbe, ConversionStrategy};
use crate::temp_files::{ConvertedArtifact, TempFileManager};
use crate::types::{AudioFormat, ConversionAttempt, NormalizedAudio};

/// Runs the conversion cascade
#[derive(Clone)]
pub struct AudioNormalizer {
    strategies: Vec<Arc<dyn ConversionStrategy>>,
    probe: Arc<dyn AudioProbe>,
    files: TempFileManager,
}

impl fmt::Debug for AudioNormalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioNormalizer")
            .field("strategies", &self.strategy_ids())
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

impl AudioNormalizer {
    /// Build the default three step cascade
    #[must_use]
    pub fn from_config(config: &SpeechConfig, files: TempFileManager) -> Self {
        let strategies: Vec<Arc<dyn ConversionStrategy>> = vec![
            Arc::new(DecodeStrategy::new(config.ffmpeg_path.clone())),
            Arc::new(TranscoderStrategy::new(config.ffmpeg_path.clone())),
            Arc::new(ExternalToolStrategy::new(
                config.sox_path.clone(),
                config.ffmpeg_path.clone(),
            )),
        ];
        Self::with_strategies(strategies, Arc::new(EngineAudioProbe), files)
    }

    /// Build a normalizer with a custom cascade
    #[must_use]
    pub fn with_strategies(
        strategies: Vec<Arc<dyn ConversionStrategy>>,
        probe: Arc<dyn AudioProbe>,
        files: TempFileManager,
    ) -> Self {
        Self {
            strategies,
            probe,
            files,
        }
    }

    /// Identifiers of the configured strategies, in order
    #[must_use]
    pub fn strategy_ids(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.id()).collect()
    }

    /// Normalize `input` into `desired`
    ///
    /// Returns the input unchanged when it is already in the desired format
    /// (for WAV, only if the probe accepts it). Otherwise every strategy is
    /// tried in order; failed outputs are deleted before the next attempt.
    ///
    /// # Errors
    ///
    /// Returns `SpeechError::ConversionFailed` carrying the last underlying
    /// error once every strategy has failed.
    #[instrument(skip(self), fields(input = %input.display(), desired = %desired))]
    pub async fn normalize(
        &self,
        input: &Path,
        desired: AudioFormat,
    ) -> Result<NormalizedAudio, SpeechError> {
        let declared = input
            .extension()
            .and_then(OsStr::to_str)
            .and_then(AudioFormat::from_extension);

        if declared == Some(desired) {
            if desired != AudioFormat::Wav {
                debug!("Input already in desired format");
                return Ok(unchanged(input));
            }

            match self.run_probe(input, desired).await {
                Ok(()) => {
                    debug!("WAV input accepted by probe");
                    return Ok(unchanged(input));
                },
                Err(e) => debug!(error = %e, "WAV input rejected by probe, converting"),
            }
        }

        let mut attempts = Vec::with_capacity(self.strategies.len());
        let mut last_error = None;

        for strategy in &self.strategies {
            let output = self.files.scratch_path(desired.extension());
            let artifact = ConvertedArtifact::new(output.clone(), self.files.clone());

            let outcome = match strategy.convert(input, &output, desired).await {
                Ok(()) => self.run_probe(&output, desired).await,
                Err(e) => Err(e),
            };

            attempts.push(ConversionAttempt {
                strategy: strategy.id(),
                input: input.to_path_buf(),
                output: output.clone(),
                succeeded: outcome.is_ok(),
            });

            match outcome {
                Ok(()) => {
                    info!(
                        strategy = strategy.id(),
                        attempt = attempts.len(),
                        "Audio normalized"
                    );
                    return Ok(NormalizedAudio {
                        path: artifact.into_path(),
                        was_converted: true,
                        attempts,
                    });
                },
                Err(e) => {
                    warn!(
                        strategy = strategy.id(),
                        attempt = attempts.len(),
                        error = %e,
                        "Conversion attempt failed"
                    );
                    artifact.release().await;
                    last_error = Some(e);
                },
            }
        }

        let reason = match last_error {
            Some(SpeechError::ConversionFailed(msg)) => msg,
            Some(other) => other.to_string(),
            None => "no conversion strategies configured".to_string(),
        };
        Err(SpeechError::ConversionFailed(reason))
    }

    async fn run_probe(&self, path: &Path, format: AudioFormat) -> Result<(), SpeechError> {
        let probe = Arc::clone(&self.probe);
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || probe.probe(&path, format))
            .await
            .map_err(|e| SpeechError::ConversionFailed(format!("probe worker failed: {e}")))?
    }
}

fn unchanged(input: &Path) -> NormalizedAudio {
    NormalizedAudio {
        path: input.to_path_buf(),
        was_converted: false,
        attempts: Vec::new(),
    }
}
