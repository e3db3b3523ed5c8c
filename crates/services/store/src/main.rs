//! Store API binary
//!
//! Serves the record API and the WebSocket observer feed.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roadwatch_store::{
    api::{build_router, AppState},
    Config, IngestionGateway, SqliteRecordStore, SubscriptionHub,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Roadwatch store API...");

    let config = Arc::new(Config::load(std::env::var("STORE_CONFIG").ok())?);

    tracing::info!(
        bind = %config.bind_addr(),
        database = %config.database.path,
        send_timeout_ms = config.subscribers.send_timeout_ms,
        "Configuration loaded"
    );

    let store = SqliteRecordStore::open(&config.database.path)
        .with_context(|| format!("opening database {}", config.database.path))?;
    let hub = Arc::new(SubscriptionHub::new(config.subscribers.hub_config()));
    let gateway = Arc::new(IngestionGateway::new(Arc::new(store), hub));

    let router = build_router(AppState::new(gateway, config.clone()));

    let bind_addr = config.bind_addr();
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;
    tracing::info!("HTTP server listening on {}", bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            shutdown_signal().await;
            tracing::info!("Shutdown signal received, initiating graceful shutdown...");
        })
        .await?;

    tracing::info!("Store API shutdown complete");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
}
