//! Health check handlers

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::state::TranscriptionState;

/// Transcription service health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionHealth {
    pub estado: String,
    pub version: String,
    pub motor_transcripcion: String,
}

/// Liveness check for the transcription service
pub async fn transcription_health(State(state): State<TranscriptionState>) -> Json<TranscriptionHealth> {
    Json(TranscriptionHealth {
        estado: "en línea".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        motor_transcripcion: state.config.speech.engine.clone(),
    })
}

/// Completion service health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionHealth {
    pub estado: String,
}

/// Liveness check for the completion proxy
pub async fn completion_health() -> Json<CompletionHealth> {
    Json(CompletionHealth {
        estado: "operativo".to_string(),
    })
}
