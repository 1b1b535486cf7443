//! HTTP API server for external control (hotkey daemon, picker UI)
//!
//! This module provides a REST API for driving the session controller and
//! the retry/queue surface:
//! - POST /session/toggle - Toggle recording (optionally interstitial)
//! - POST /session/ptt/start, /session/ptt/release - Press-to-talk
//! - POST /session/cancel - Discard the current recording
//! - POST /session/queue - Push the in-flight transcription to the queue
//! - GET /records, /records/pending, /records/search - Record queries
//! - POST /records/:id/redeliver, /records/:id/resubmit - Retry paths
//! - GET /engine/status, /engine/models - Engine administration
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
