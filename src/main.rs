mod adapters;
mod application;
mod domain;
mod services;

use std::{sync::Arc, time::Duration};

use adapters::{
    routes::{build_router, cors_layer},
    state::AppState,
};
use application::services::FileService;
use domain::config::{AppConfig, ConfigError};
use services::{create_storage_router, StorageError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum BootError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // TLS connections to MongoDB need a process-wide crypto provider
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    if let Err(e) = run().await {
        tracing::error!("ERROR: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BootError> {
    let config = AppConfig::from_env()?;

    tracing::info!(
        driver = %config.storage.driver(),
        port = config.server.port,
        "Starting file-svc"
    );

    // Refuses to continue without a live backend
    let storage = create_storage_router(&config.storage).await?;

    let shutdown = CancellationToken::new();
    let app_state = AppState {
        file_service: Arc::new(FileService::new(storage.clone(), config.limits)),
        storage: storage.clone(),
        request_timeout: config.server.request_timeout,
        shutdown: shutdown.clone(),
    };

    let router = build_router(
        app_state,
        cors_layer(config.server.cors_allowed_origins.as_deref()),
        config.limits.max_file_size,
    );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.server.port)).await?;

    tracing::info!("Server listening on 0.0.0.0:{}", config.server.port);

    let grace = config.server.shutdown_timeout;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal(shutdown, grace))
        .await?;

    if let Err(e) = storage.close(grace).await {
        tracing::warn!("Failed to close storage cleanly: {}", e);
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on SIGINT/SIGTERM. In-flight operations get `grace` to finish
/// before their scopes are cancelled.
async fn shutdown_signal(shutdown: CancellationToken, grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!(grace_secs = grace.as_secs(), "Shutting down");

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        shutdown.cancel();
    });
}
