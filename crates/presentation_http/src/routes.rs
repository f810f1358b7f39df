//! Route definitions

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::{
    handlers,
    state::{CompletionState, TranscriptionState},
};

/// Create the transcription service router
///
/// The body limit sits above the configured upload limit so oversized files
/// reach the validator and get its 413 message.
pub fn create_transcription_router(state: TranscriptionState) -> Router {
    let body_limit = state.config.server.max_body_size_bytes;

    Router::new()
        .route("/salud", get(handlers::health::transcription_health))
        .route(
            "/api/v1/transcribir",
            post(handlers::transcription::transcribe),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Create the text completion router
pub fn create_completion_router(state: CompletionState) -> Router {
    Router::new()
        .route("/salud", get(handlers::health::completion_health))
        .route("/api/v1/ia/procesar", post(handlers::completion::process))
        .route("/api/v1/ia/estado", get(handlers::completion::status))
        .with_state(state)
}
