//! Server bootstrap shared by both binaries

use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method},
};
use infrastructure::ServerConfig;
use tokio::{net::TcpListener, signal};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::middleware::RequestIdLayer;

/// CORS policy for the configured origins
///
/// An empty origin list allows every origin.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    if config.allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            },
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
}

/// Wrap a router with tracing, request IDs and CORS
pub fn apply_middleware(router: Router, config: &ServerConfig) -> Router {
    // First added = innermost
    let router = router
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer::new());

    if config.cors_enabled {
        router.layer(cors_layer(config))
    } else {
        router
    }
}

/// Bind and serve until SIGINT or SIGTERM
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn serve(app: Router, config: &ServerConfig) -> std::io::Result<()> {
    let addr = config.bind_address();
    let listener = TcpListener::bind(&addr).await?;
    info!(address = %addr, "🚀 Server listening");

    let shutdown_timeout = Duration::from_secs(config.shutdown_timeout_secs.unwrap_or(30));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await?;

    info!("👋 Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signals (SIGINT, SIGTERM)
pub async fn shutdown_signal(timeout: Duration) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("📥 Received Ctrl+C, initiating graceful shutdown...");
        }
        () = terminate => {
            info!("📥 Received SIGTERM, initiating graceful shutdown...");
        }
    }

    info!("⏳ Waiting up to {:?} for connections to close...", timeout);
}
