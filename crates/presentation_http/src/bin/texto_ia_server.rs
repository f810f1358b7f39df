//! Text completion HTTP server
//!
//! Forwards prompts from `/api/v1/ia/procesar` to the chat-completion API.

use std::sync::Arc;

use infrastructure::{AppConfig, Service, init_tracing};
use presentation_http::{CompletionState, apply_middleware, create_completion_router, serve};
use text_completion::{CompletionClient, CompletionPort};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let loaded = AppConfig::load(Service::Completion);
    let config = loaded.as_ref().map_or_else(|_| AppConfig::default(), Clone::clone);

    init_tracing(&config.server)?;

    if let Err(e) = &loaded {
        warn!("Failed to load config, using defaults: {}", e);
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    info!("🤖 texto-ia v{} starting...", env!("CARGO_PKG_VERSION"));
    info!(
        host = %config.server.host,
        port = config.server.port,
        api_url = %config.completion.api_url,
        model = %config.completion.model,
        "Configuration loaded"
    );

    if config.completion.api_key.is_none() {
        warn!("No completion API key configured; upstream calls will be rejected");
    }

    let client = CompletionClient::new(config.completion.clone())
        .map_err(|e| anyhow::anyhow!("Failed to initialize completion client: {e}"))?;
    let completion: Arc<dyn CompletionPort> = Arc::new(client);

    let server_config = config.server.clone();
    let app = apply_middleware(
        create_completion_router(CompletionState::new(completion, config)),
        &server_config,
    );

    serve(app, &server_config).await?;
    Ok(())
}
