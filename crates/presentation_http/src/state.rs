//! Application state shared across handlers

use std::sync::Arc;

use infrastructure::AppConfig;
use speech_to_text::TranscriptionPipeline;
use text_completion::CompletionPort;

/// State for the transcription service
#[derive(Debug, Clone)]
pub struct TranscriptionState {
    /// Upload to transcript pipeline
    pub pipeline: Arc<TranscriptionPipeline>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl TranscriptionState {
    #[must_use]
    pub fn new(pipeline: TranscriptionPipeline, config: AppConfig) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            config: Arc::new(config),
        }
    }
}

/// State for the text completion proxy
#[derive(Clone)]
pub struct CompletionState {
    /// Chat-completion backend
    pub completion: Arc<dyn CompletionPort>,
    /// Application configuration
    pub config: Arc<AppConfig>,
}

impl CompletionState {
    #[must_use]
    pub fn new(completion: Arc<dyn CompletionPort>, config: AppConfig) -> Self {
        Self {
            completion,
            config: Arc::new(config),
        }
    }
}

impl std::fmt::Debug for CompletionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionState")
            .field("default_model", &self.completion.default_model())
            .finish_non_exhaustive()
    }
}
