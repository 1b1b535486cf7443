use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::delivery::Router;
use crate::records::{RecordStore, UtteranceRecord};

/// Redelivery coordination for the retry/queue surface.
///
/// Works only on already-transcribed text: redelivery never re-invokes
/// transcription. Records that never transcribed go back through the
/// controller's resubmit path instead.
pub struct RetryQueue {
    store: Arc<dyn RecordStore>,
    router: Arc<dyn Router>,
}

impl RetryQueue {
    pub fn new(store: Arc<dyn RecordStore>, router: Arc<dyn Router>) -> Self {
        Self { store, router }
    }

    /// Records eligible for the picker: queued/interstitial/failed with no
    /// paste timestamp.
    pub async fn candidates(&self) -> Result<Vec<UtteranceRecord>> {
        self.store.queued_or_failed().await
    }

    /// Deliver a queued record's text to the focused application and mark
    /// it delivered.
    pub async fn redeliver(&self, id: &str) -> Result<UtteranceRecord> {
        let record = self
            .store
            .fetch(id)
            .await?
            .with_context(|| format!("No record with id {}", id))?;

        self.router.deliver(&record.text).await?;
        self.store.mark_delivered(id, Utc::now()).await?;

        info!("Redelivered record {}", id);

        // Hand back the refreshed row rather than patching our copy.
        self.store
            .fetch(id)
            .await?
            .with_context(|| format!("Record {} disappeared after redelivery", id))
    }
}
