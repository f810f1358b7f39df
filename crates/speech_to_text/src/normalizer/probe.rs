//! Engine compatibility probe

use std::fs::File;
use std::path::Path;

use hound::{SampleFormat, WavReader};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::SpeechError;
use crate::ports::AudioProbe;
use crate::types::AudioFormat;

/// Accepts what the engines can read: integer PCM WAV, or any container
/// symphonia recognizes for other formats.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineAudioProbe;

impl EngineAudioProbe {
    fn probe_wav(path: &Path) -> Result<(), SpeechError> {
        let reader = WavReader::open(path)
            .map_err(|e| SpeechError::ConversionFailed(format!("unreadable WAV: {e}")))?;
        let spec = reader.spec();

        if spec.sample_format != SampleFormat::Int {
            return Err(SpeechError::ConversionFailed(
                "WAV must contain integer PCM samples".to_string(),
            ));
        }

        Ok(())
    }

    fn probe_container(path: &Path, format: AudioFormat) -> Result<(), SpeechError> {
        let file = File::open(path)
            .map_err(|e| SpeechError::ConversionFailed(format!("cannot open audio: {e}")))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        hint.with_extension(format.extension());

        symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| SpeechError::ConversionFailed(format!("unrecognized {format}: {e}")))?;

        Ok(())
    }
}

impl AudioProbe for EngineAudioProbe {
    fn probe(&self, path: &Path, format: AudioFormat) -> Result<(), SpeechError> {
        match format {
            AudioFormat::Wav => Self::probe_wav(path),
            other => Self::probe_container(path, other),
        }
    }
}
