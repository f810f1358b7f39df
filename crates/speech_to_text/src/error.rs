//! Speech processing errors

use thiserror::Error;

/// Errors surfaced by the transcription pipeline
#[derive(Debug, Error)]
pub enum SpeechError {
    /// Upload extension is not in the allowed set
    #[error("Unsupported audio format '{extension}'. Allowed formats: {allowed}")]
    FormatUnsupported {
        /// Resolved extension (may be empty)
        extension: String,
        /// Comma separated list of accepted extensions
        allowed: String,
    },

    /// Upload exceeds the configured size limit
    #[error("File too large: {size_mb:.2} MB exceeds the maximum of {max_mb} MB")]
    FileTooLarge {
        /// Size of the upload in megabytes
        size_mb: f64,
        /// Configured maximum in megabytes
        max_mb: u64,
    },

    /// Every conversion strategy failed
    #[error("Audio conversion failed: {0}")]
    ConversionFailed(String),

    /// Engine cannot be built from the current configuration
    #[error("Transcription engine misconfigured: {0}")]
    EngineMisconfigured(String),

    /// Configured engine name is unknown
    #[error("Unsupported transcription engine: {0}")]
    EngineUnsupported(String),

    /// Engine returned no usable transcript
    #[error("Speech could not be recognized")]
    Unrecognized,

    /// Recognition backend call failed
    #[error("Recognition request failed: {0}")]
    EngineRequestFailed(String),

    /// Recognition took longer than the configured limit
    #[error("Transcription timed out after {secs}s")]
    Timeout {
        /// Configured limit in seconds
        secs: u64,
    },

    /// Catch-all for engine failures outside the taxonomy above
    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    /// Scratch directory could not be written
    #[error("Scratch storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(err: reqwest::Error) -> Self {
        Self::EngineRequestFailed(err.to_string())
    }
}

/// Failures raised inside an engine before they are folded into [`SpeechError`]
#[derive(Debug, Error)]
pub enum EngineError {
    /// Already classified failure
    #[error(transparent)]
    Speech(#[from] SpeechError),

    /// Reading the audio file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a readable WAV stream
    #[error("WAV error: {0}")]
    Wav(#[from] hound::Error),

    /// The backend answered with something that is not the expected JSON
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// Blocking worker panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Speech(SpeechError::from(err))
    }
}

impl From<EngineError> for SpeechError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Speech(inner) => inner,
            other => Self::TranscriptionFailed(other.to_string()),
        }
    }
}
