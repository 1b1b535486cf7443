use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Session control
        .route("/session", get(handlers::get_session))
        .route("/session/toggle", post(handlers::toggle_session))
        .route("/session/ptt/start", post(handlers::ptt_start))
        .route("/session/ptt/release", post(handlers::ptt_release))
        .route("/session/cancel", post(handlers::cancel_session))
        .route("/session/queue", post(handlers::push_to_queue))
        // Record queries and the retry/queue surface
        .route(
            "/records",
            get(handlers::list_records).delete(handlers::delete_all_records),
        )
        .route("/records/pending", get(handlers::list_pending_records))
        .route("/records/search", get(handlers::search_records))
        .route(
            "/records/:record_id",
            get(handlers::get_record).delete(handlers::delete_record),
        )
        .route(
            "/records/:record_id/redeliver",
            post(handlers::redeliver_record),
        )
        .route(
            "/records/:record_id/resubmit",
            post(handlers::resubmit_record),
        )
        .route("/records/prune", post(handlers::prune_records))
        // Engine administration
        .route("/engine/status", get(handlers::engine_status))
        .route("/engine/models", get(handlers::engine_models))
        .route("/engine/preload", post(handlers::engine_preload))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
