use super::state::AppState;
use crate::controller::SessionState;
use crate::engine::ConnectionInfo;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct ToggleRequest {
    /// Route the transcript to the edit surface instead of pasting
    #[serde(default)]
    pub interstitial: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub state: SessionState,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct PruneRequest {
    pub older_than_hours: i64,
}

#[derive(Debug, Serialize)]
pub struct PruneResponse {
    pub removed: usize,
}

#[derive(Debug, Deserialize)]
pub struct PreloadRequest {
    pub model_id: String,
}

#[derive(Debug, Serialize)]
pub struct EngineStatusResponse {
    pub connection: ConnectionInfo,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn internal_error(err: impl std::fmt::Display) -> axum::response::Response {
    error!("Request failed: {}", err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
        .into_response()
}

fn not_found(what: impl std::fmt::Display) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("{} not found", what),
        }),
    )
        .into_response()
}

// ============================================================================
// Session control
// ============================================================================

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    let session_state = state.controller.state().await;
    (StatusCode::OK, Json(SessionResponse { state: session_state }))
}

/// POST /session/toggle
pub async fn toggle_session(
    State(state): State<AppState>,
    body: Option<Json<ToggleRequest>>,
) -> impl IntoResponse {
    let Json(req) = body.unwrap_or_default();

    match state.controller.toggle(req.interstitial).await {
        Ok(()) => {
            let session_state = state.controller.state().await;
            (
                StatusCode::OK,
                Json(SessionResponse {
                    state: session_state,
                }),
            )
                .into_response()
        }
        Err(e) => internal_error(e),
    }
}

/// POST /session/ptt/start
pub async fn ptt_start(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.press_to_talk_start().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /session/ptt/release
pub async fn ptt_release(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.press_to_talk_release().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /session/cancel
pub async fn cancel_session(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.cancel().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /session/queue
/// Push the in-flight transcription to the retry queue
pub async fn push_to_queue(State(state): State<AppState>) -> impl IntoResponse {
    match state.controller.push_to_queue().await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Records + retry/queue surface
// ============================================================================

/// GET /records
pub async fn list_records(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.all().await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /records/pending
/// Retry candidates: queued/interstitial/failed, never delivered
pub async fn list_pending_records(State(state): State<AppState>) -> impl IntoResponse {
    match state.retry_queue.candidates().await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /records/search?q=
pub async fn search_records(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> impl IntoResponse {
    match state.store.search(&query.q).await {
        Ok(records) => (StatusCode::OK, Json(records)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /records/:record_id
pub async fn get_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> impl IntoResponse {
    match state.store.fetch(&record_id).await {
        Ok(Some(record)) => (StatusCode::OK, Json(record)).into_response(),
        Ok(None) => not_found(format!("Record {}", record_id)),
        Err(e) => internal_error(e),
    }
}

/// DELETE /records/:record_id
pub async fn delete_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&record_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

/// DELETE /records
pub async fn delete_all_records(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.delete_all().await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /records/:record_id/redeliver
/// Copy an already-transcribed record's text out and mark it delivered
pub async fn redeliver_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> impl IntoResponse {
    info!("Redelivering record: {}", record_id);

    match state.retry_queue.redeliver(&record_id).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /records/:record_id/resubmit
/// Re-run transcription from the record's stored audio
pub async fn resubmit_record(
    State(state): State<AppState>,
    Path(record_id): Path<String>,
) -> impl IntoResponse {
    info!("Resubmitting record: {}", record_id);

    match state.controller.resubmit(&record_id).await {
        Ok(()) => StatusCode::ACCEPTED.into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /records/prune
pub async fn prune_records(
    State(state): State<AppState>,
    Json(req): Json<PruneRequest>,
) -> impl IntoResponse {
    match state.store.prune(req.older_than_hours).await {
        Ok(removed) => (StatusCode::OK, Json(PruneResponse { removed })).into_response(),
        Err(e) => internal_error(e),
    }
}

// ============================================================================
// Engine administration
// ============================================================================

/// GET /engine/status
pub async fn engine_status(State(state): State<AppState>) -> impl IntoResponse {
    let connection = state.engine.connection_info().await;
    (StatusCode::OK, Json(EngineStatusResponse { connection }))
}

/// GET /engine/models
pub async fn engine_models(State(state): State<AppState>) -> impl IntoResponse {
    match state.engine.refresh_available_models().await {
        Ok(models) => (StatusCode::OK, Json(models)).into_response(),
        Err(e) => internal_error(e),
    }
}

/// POST /engine/preload
pub async fn engine_preload(
    State(state): State<AppState>,
    Json(req): Json<PreloadRequest>,
) -> impl IntoResponse {
    match state.engine.preload_model(&req.model_id).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => internal_error(e),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
