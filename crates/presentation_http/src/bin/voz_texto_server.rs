//! Speech-to-text HTTP server
//!
//! Accepts multipart audio uploads on `/api/v1/transcribir`.

use infrastructure::{AppConfig, Service, init_tracing};
use presentation_http::{TranscriptionState, apply_middleware, create_transcription_router, serve};
use speech_to_text::TranscriptionPipeline;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = AppConfig::load(Service::Transcription);
    let config = loaded.as_ref().map_or_else(|_| AppConfig::default(), Clone::clone);

    init_tracing(&config.server)?;

    if let Err(e) = &loaded {
        warn!("Failed to load config, using defaults: {}", e);
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    info!("🎙️ voz-texto v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        engine = %config.speech.engine,
        max_file_size_mb = config.speech.max_file_size_mb,
        "Configuration loaded"
    );

    let pipeline = TranscriptionPipeline::from_config(&config.speech)
        .map_err(|e| anyhow::anyhow!("Failed to initialize transcription pipeline: {e}"))?;

    let server_config = config.server.clone();
    let app = apply_middleware(
        create_transcription_router(TranscriptionState::new(pipeline, config)),
        &server_config,
    );

    serve(app, &server_config).await?;
    Ok(())
}
