//! Types for the transcription pipeline
//!
//! Contains the upload container, format table, request options and results.

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Language used when the caller does not request one
pub const DEFAULT_LANGUAGE: &str = "es-ES";

/// Model identifier used when the caller does not request one
pub const DEFAULT_MODEL: &str = "default";

/// Audio containers the pipeline knows how to name and convert into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV container (PCM)
    Wav,
    /// WebM container
    Webm,
    /// MP3 format
    Mp3,
    /// OGG container (Vorbis or Opus)
    Ogg,
    /// FLAC format (lossless)
    Flac,
    /// AIFF container
    Aiff,
    /// M4A/MP4 audio
    M4a,
    /// Raw AAC stream
    Aac,
}

impl AudioFormat {
    /// Get the file extension for this audio format
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
            Self::Ogg => "ogg",
            Self::Flac => "flac",
            Self::Aiff => "aiff",
            Self::M4a => "m4a",
            Self::Aac => "aac",
        }
    }

    /// Parse a file extension (without the dot, any case)
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "webm" => Some(Self::Webm),
            "mp3" => Some(Self::Mp3),
            "ogg" => Some(Self::Ogg),
            "flac" => Some(Self::Flac),
            "aiff" | "aif" => Some(Self::Aiff),
            "m4a" => Some(Self::M4a),
            "aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Parse audio format from a declared content type
    ///
    /// Parameters such as `; codecs=opus` are ignored.
    #[must_use]
    pub fn from_mime_type(content_type: &str) -> Option<Self> {
        match base_mime(content_type).as_str() {
            "audio/webm" | "video/webm" => Some(Self::Webm),
            "audio/mpeg" | "audio/mp3" => Some(Self::Mp3),
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some(Self::Wav),
            "audio/ogg" | "audio/opus" | "audio/vorbis" => Some(Self::Ogg),
            "audio/flac" | "audio/x-flac" => Some(Self::Flac),
            "audio/x-aiff" | "audio/aiff" => Some(Self::Aiff),
            "audio/x-m4a" | "audio/mp4" => Some(Self::M4a),
            "audio/aac" => Some(Self::Aac),
            _ => None,
        }
    }

    /// Whether `ext` is one of the extensions produced by the MIME table
    #[must_use]
    pub fn is_known_extension(ext: &str) -> bool {
        Self::ALL.iter().any(|format| format.extension() == ext)
    }

    /// Every format in table order
    pub const ALL: [Self; 8] = [
        Self::Webm,
        Self::Mp3,
        Self::Wav,
        Self::Ogg,
        Self::Flac,
        Self::Aiff,
        Self::M4a,
        Self::Aac,
    ];
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Lower-cased `type/subtype` of a content type, parameters stripped
pub(crate) fn base_mime(content_type: &str) -> String {
    content_type.parse::<mime::Mime>().map_or_else(
        |_| {
            content_type
                .split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        },
        |parsed| parsed.essence_str().to_ascii_lowercase(),
    )
}

/// An uploaded audio file as received from the client
#[derive(Debug, Clone)]
pub struct AudioUpload {
    body: Bytes,
    content_type: String,
    filename: Option<String>,
    reported_size: Option<u64>,
}

impl AudioUpload {
    /// Create an upload from its bytes and declared content type
    #[must_use]
    pub fn new(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.into(),
            filename: None,
            reported_size: None,
        }
    }

    /// Attach the client supplied filename
    #[must_use]
    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Attach a size reported by the transport layer
    #[must_use]
    pub const fn with_reported_size(mut self, size: u64) -> Self {
        self.reported_size = Some(size);
        self
    }

    /// Raw bytes of the upload
    #[must_use]
    pub const fn body(&self) -> &Bytes {
        &self.body
    }

    /// Declared content type
    #[must_use]
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Client supplied filename
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Size in bytes, preferring the reported size over the measured one
    #[must_use]
    pub fn size_bytes(&self) -> u64 {
        self.reported_size.unwrap_or(self.body.len() as u64)
    }

    /// Size in megabytes (MiB)
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn size_mb(&self) -> f64 {
        self.size_bytes() as f64 / (1024.0 * 1024.0)
    }

    /// Extension derived from the filename and the declared content type
    ///
    /// Without a filename suffix the MIME table decides. When both are known
    /// and disagree the filename wins, unless its suffix is not a known audio
    /// extension. Returns an empty string if nothing resolves.
    #[must_use]
    pub fn extension(&self) -> String {
        let from_mime = AudioFormat::from_mime_type(&self.content_type).map(|f| f.extension());

        let from_name = self
            .filename
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, suffix)| suffix.to_ascii_lowercase());

        match (from_name, from_mime) {
            (None, mime) => mime.unwrap_or_default().to_string(),
            (Some(name), Some(mime)) if name != mime => {
                if AudioFormat::is_known_extension(&name) {
                    name
                } else {
                    mime.to_string()
                }
            },
            (Some(name), _) => name,
        }
    }
}

/// Caller supplied recognition options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionOptions {
    /// BCP-47 language tag
    pub language: Option<String>,
    /// Engine specific model identifier
    pub model: Option<String>,
    /// Recognition sensitivity in `[0, 1]`
    pub sensitivity: Option<f32>,
}

impl TranscriptionOptions {
    /// Requested language or [`DEFAULT_LANGUAGE`]
    #[must_use]
    pub fn language(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Requested model or [`DEFAULT_MODEL`]
    #[must_use]
    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Outcome of a successful transcription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    /// Recognized text
    pub text: String,
    /// Confidence score (never set by the bundled engines)
    pub confidence: Option<f32>,
    /// Echo of the requested language
    pub detected_language: Option<String>,
    /// Audio duration in seconds (never set by the bundled engines)
    pub duration_secs: Option<f64>,
}

impl TranscriptionResult {
    /// Build a result that echoes the requested language
    #[must_use]
    pub fn new(text: impl Into<String>, options: &TranscriptionOptions) -> Self {
        Self {
            text: text.into(),
            confidence: None,
            detected_language: options.language.clone(),
            duration_secs: None,
        }
    }
}

/// One step of the conversion cascade
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionAttempt {
    /// Identifier of the strategy that ran
    pub strategy: &'static str,
    /// Source file
    pub input: PathBuf,
    /// Target file
    pub output: PathBuf,
    /// Whether the output passed the probe
    pub succeeded: bool,
}

/// Result of running the normalizer
#[derive(Debug, Clone)]
pub struct NormalizedAudio {
    /// File the engine should read
    pub path: PathBuf,
    /// `true` if `path` is a new artifact that must be cleaned up
    pub was_converted: bool,
    /// Attempts made by the cascade, in order
    pub attempts: Vec<ConversionAttempt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_table_maps_aliases() {
        assert_eq!(AudioFormat::from_mime_type("video/webm"), Some(AudioFormat::Webm));
        assert_eq!(AudioFormat::from_mime_type("audio/mp3"), Some(AudioFormat::Mp3));
        assert_eq!(
            AudioFormat::from_mime_type("audio/vnd.wave"),
            Some(AudioFormat::Wav)
        );
        assert_eq!(AudioFormat::from_mime_type("audio/opus"), Some(AudioFormat::Ogg));
        assert_eq!(AudioFormat::from_mime_type("audio/x-flac"), Some(AudioFormat::Flac));
        assert_eq!(AudioFormat::from_mime_type("audio/aiff"), Some(AudioFormat::Aiff));
        assert_eq!(AudioFormat::from_mime_type("audio/mp4"), Some(AudioFormat::M4a));
        assert_eq!(AudioFormat::from_mime_type("audio/aac"), Some(AudioFormat::Aac));
        assert_eq!(AudioFormat::from_mime_type("application/pdf"), None);
    }

    #[test]
    fn mime_parameters_and_case_are_ignored() {
        assert_eq!(
            AudioFormat::from_mime_type("Audio/OGG; codecs=opus"),
            Some(AudioFormat::Ogg)
        );
        assert_eq!(
            AudioFormat::from_mime_type("audio/webm;codecs=opus"),
            Some(AudioFormat::Webm)
        );
    }

    #[test]
    fn aif_parses_as_aiff() {
        assert_eq!(AudioFormat::from_extension("AIF"), Some(AudioFormat::Aiff));
        assert_eq!(AudioFormat::from_extension("txt"), None);
    }

    #[test]
    fn extension_from_mime_without_filename() {
        let upload = AudioUpload::new(vec![0u8; 4], "audio/mpeg");
        assert_eq!(upload.extension(), "mp3");
    }

    #[test]
    fn extension_empty_when_nothing_resolves() {
        let upload = AudioUpload::new(vec![0u8; 4], "application/octet-stream");
        assert_eq!(upload.extension(), "");
    }

    #[test]
    fn known_filename_suffix_wins_over_mime() {
        let upload = AudioUpload::new(vec![0u8; 4], "audio/webm").with_filename("note.OGG");
        assert_eq!(upload.extension(), "ogg");
    }

    #[test]
    fn unknown_filename_suffix_loses_to_mime() {
        let upload = AudioUpload::new(vec![0u8; 4], "audio/wav").with_filename("blob.bin");
        assert_eq!(upload.extension(), "wav");
    }

    #[test]
    fn filename_suffix_used_when_mime_unknown() {
        let upload =
            AudioUpload::new(vec![0u8; 4], "application/octet-stream").with_filename("a.aif");
        assert_eq!(upload.extension(), "aif");
    }

    #[test]
    fn reported_size_takes_precedence() {
        let upload = AudioUpload::new(vec![0u8; 10], "audio/wav").with_reported_size(2 * 1024 * 1024);
        assert_eq!(upload.size_bytes(), 2 * 1024 * 1024);
        assert!((upload.size_mb() - 2.0).abs() < f64::EPSILON);
        assert_eq!(upload.body().len(), 10);
    }

    #[test]
    fn options_defaults() {
        let options = TranscriptionOptions::default();
        assert_eq!(options.language(), "es-ES");
        assert_eq!(options.model(), "default");
    }

    #[test]
    fn result_echoes_requested_language_only() {
        let requested = TranscriptionOptions {
            language: Some("en-US".to_string()),
            ..Default::default()
        };
        let result = TranscriptionResult::new("hello", &requested);
        assert_eq!(result.detected_language.as_deref(), Some("en-US"));
        assert!(result.confidence.is_none());
        assert!(result.duration_secs.is_none());

        let unset = TranscriptionResult::new("hola", &TranscriptionOptions::default());
        assert!(unset.detected_language.is_none());
    }

    #[test]
    fn audio_format_display() {
        assert_eq!(AudioFormat::Wav.to_string(), "wav");
        assert_eq!(AudioFormat::Aiff.to_string(), "aiff");
    }
}
