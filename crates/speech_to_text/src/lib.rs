//! Speech to Text - audio ingestion, normalization and transcription
//!
//! Turns an uploaded audio file into text:
//! - `AudioValidator` - size and format checks before anything hits the disk
//! - `TempFileManager` - unique scratch files and lock-tolerant cleanup
//! - `AudioNormalizer` - cascade of conversion strategies into engine-ready WAV
//! - `TranscriptionService` - engine selection and error folding
//! - `TranscriptionPipeline` - the whole flow for one request
//!
//! # Architecture
//!
//! This crate follows the ports & adapters pattern:
//! - `ports` module defines the traits (ports)
//! - `engines` and `normalizer` contain concrete implementations (adapters)
//!
//! # Supported Engines
//!
//! - `local` - hosted best-effort recognizer fed with raw PCM
//! - `remote` - credentialed cloud recognition API
//!
//! # Example
//!
//! ```ignore
//! use speech_to_text::{AudioUpload, SpeechConfig, TranscriptionOptions, TranscriptionPipeline};
//!
//! let pipeline = TranscriptionPipeline::from_config(&SpeechConfig::default())?;
//!
//! let upload = AudioUpload::new(bytes, "audio/ogg").with_filename("note.ogg");
//! let result = pipeline.run(&upload, &TranscriptionOptions::default()).await?;
//! println!("Transcribed: {}", result.text);
//! ```

pub mod config;
pub mod engines;
pub mod error;
pub mod normalizer;
pub mod pipeline;
pub mod ports;
pub mod service;
pub mod temp_files;
pub mod types;
pub mod validator;

pub use config::SpeechConfig;
pub use engines::{EngineKind, LocalEngine, RemoteEngine};
pub use error::{EngineError, SpeechError};
pub use normalizer::AudioNormalizer;
pub use pipeline::TranscriptionPipeline;
pub use ports::{AudioProbe, ConversionStrategy, TranscriptionEngine};
pub use service::TranscriptionService;
pub use temp_files::{ConvertedArtifact, TempFileManager};
pub use types::{
    AudioFormat, AudioUpload, ConversionAttempt, NormalizedAudio, TranscriptionOptions,
    TranscriptionResult,
};
pub use validator::AudioValidator;
