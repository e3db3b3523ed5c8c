//! HTTP API for the store
//!
//! - `POST /processed_agent_data/` - Ingest a batch
//! - `GET /processed_agent_data/` - List records
//! - `GET|PUT|DELETE /processed_agent_data/:id` - Keyed record access
//! - `GET /ws/` - Live feed of ingested batches
//! - `GET /health` - Health check

pub mod records;
pub mod ws;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::gateway::IngestionGateway;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<IngestionGateway>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(gateway: Arc<IngestionGateway>, config: Arc<Config>) -> Self {
        Self { gateway, config }
    }
}

/// Build the HTTP API router
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/processed_agent_data/",
            get(records::list_records).post(records::ingest_records),
        )
        .route(
            "/processed_agent_data/:id",
            get(records::get_record)
                .put(records::update_record)
                .delete(records::delete_record),
        )
        .route("/ws/", get(ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
