//! # Tactical API Server
//!
//! Entry point for the tactical field engine. Wires the geospatial store,
//! location tracker and tactical link under the service orchestrator and
//! exposes them over a local REST API.

mod config;
mod error;
mod handlers;
mod routes;
mod state;

use crate::config::{ApiConfig, LogFormat};
use crate::routes::create_router;
use crate::state::AppState;

use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let config = ApiConfig::from_env();

    // Initialize logging
    init_logging(config.log_format);

    info!("Starting Tactical Field Engine v{}", env!("CARGO_PKG_VERSION"));
    info!("   API Port: {}", config.api_port);
    info!("   Callsign: {}", config.callsign);
    info!("   Simulation mode: {}", config.simulation_mode);
    info!("   Auto-connect link: {}", config.auto_connect);

    // Initialize application state
    let state = AppState::new(config.clone())?;
    let metrics_task = state.metrics.clone().spawn_event_listener(&state.events);
    info!("Application state initialized");

    // Start services in background so health endpoints answer during startup
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        if let Err(e) = orchestrator.start().await {
            error!("Tactical services failed to start: {}", e);
            warn!("Running in degraded mode (store and link endpoints only)");
        }
    });

    // Create router
    let app = create_router(state.clone());
    info!("Routes configured");

    // Start API server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.api_port));
    info!("API server listening on http://{}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.orchestrator.shutdown().await;
    metrics_task.abort();

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize logging with tracing
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,tactical_api=debug,tactical_orchestrator=debug")
    });

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(true))
            .init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .init(),
    }
}

/// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down...");
        }
    }
}
