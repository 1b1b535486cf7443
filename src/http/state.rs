use crate::controller::{RetryQueue, SessionController};
use crate::engine::EngineClient;
use crate::records::RecordStore;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub controller: SessionController,
    pub store: Arc<dyn RecordStore>,
    pub retry_queue: Arc<RetryQueue>,
    pub engine: Arc<EngineClient>,
}

impl AppState {
    pub fn new(
        controller: SessionController,
        store: Arc<dyn RecordStore>,
        retry_queue: Arc<RetryQueue>,
        engine: Arc<EngineClient>,
    ) -> Self {
        Self {
            controller,
            store,
            retry_queue,
            engine,
        }
    }
}
