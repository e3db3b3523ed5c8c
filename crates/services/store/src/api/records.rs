//! Record endpoints
//!
//! Ingestion and keyed access to stored records.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use roadwatch_core::ProcessedAgentData;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::gateway::GatewayError;

/// Status message body
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Error body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn message(status: StatusCode, text: &str) -> Response {
    (
        status,
        Json(MessageResponse {
            message: text.to_string(),
        }),
    )
        .into_response()
}

fn not_found() -> Response {
    message(StatusCode::NOT_FOUND, "Data not found")
}

fn internal_error(err: GatewayError) -> Response {
    tracing::error!(error = %err, "Store request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

/// Persist a batch and broadcast it to subscribers
///
/// POST /processed_agent_data/
pub async fn ingest_records(
    State(state): State<AppState>,
    Json(batch): Json<Vec<ProcessedAgentData>>,
) -> Response {
    match state.gateway.ingest(batch).await {
        Ok(_) => message(StatusCode::OK, "Data inserted successfully"),
        Err(e) => internal_error(e),
    }
}

/// GET /processed_agent_data/
pub async fn list_records(State(state): State<AppState>) -> Response {
    match state.gateway.list().await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /processed_agent_data/:id
pub async fn get_record(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.gateway.fetch(id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => not_found(),
        Err(e) => internal_error(e),
    }
}

/// Replace a stored record
///
/// PUT /processed_agent_data/:id
pub async fn update_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(data): Json<ProcessedAgentData>,
) -> Response {
    match state.gateway.update(id, &data).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => not_found(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /processed_agent_data/:id
pub async fn delete_record(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.gateway.delete(id).await {
        Ok(true) => message(StatusCode::OK, "Data deleted successfully"),
        Ok(false) => not_found(),
        Err(e) => internal_error(e),
    }
}
