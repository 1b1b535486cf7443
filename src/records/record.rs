use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::CapturedContext;

/// Placeholder transcript text until a queued/failed record is resolved.
pub const PLACEHOLDER_TEXT: &str = "queued for retry";

/// How (or whether) a transcript was handed to its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    /// Simulated paste into the previously focused application
    Paste,
    /// Clipboard write only
    Clipboard,
    /// Deliberately held back (e.g. our own UI was frontmost)
    Queued,
    /// Handed to the edit surface instead of pasted
    Interstitial,
    /// Transcription failed; held for retry
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptionStatus {
    Pending,
    Success,
    Failed,
}

/// Per-stage latency breakdown, all in milliseconds.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StageTimings {
    /// Capture stop to engine call (durable copy + context refresh)
    pub pre_engine_ms: u64,
    /// Engine round-trip
    pub engine_ms: u64,
    /// Delivery + persistence after the engine returned
    pub post_engine_ms: u64,
    /// End to end
    pub total_ms: u64,
}

/// The durable unit of output: one recording/transcription attempt.
///
/// Created once per attempt; later changes (redelivery marks, resubmission
/// results) go through the store's update path, never through controller-held
/// mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtteranceRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub text: String,
    pub mode: DeliveryMode,
    pub start_context: Option<CapturedContext>,
    pub end_context: Option<CapturedContext>,
    pub duration_ms: u64,
    /// Filename in the durable audio vault. The file is never moved or
    /// overwritten once written.
    pub audio_file: String,
    pub model_id: String,
    pub timings: StageTimings,
    pub status: TranscriptionStatus,
    pub error: Option<String>,
    /// Recording began while our own UI was frontmost; forces queueing.
    pub self_frontmost: bool,
    /// None until the text was actually delivered somewhere.
    pub pasted_at: Option<DateTime<Utc>>,
}

impl UtteranceRecord {
    /// Eligible for the retry/queue surface: never delivered, and either
    /// held back or failed.
    pub fn is_retry_candidate(&self) -> bool {
        self.pasted_at.is_none()
            && matches!(
                self.mode,
                DeliveryMode::Queued | DeliveryMode::Interstitial | DeliveryMode::Failed
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(mode: DeliveryMode, pasted: bool) -> UtteranceRecord {
        UtteranceRecord {
            id: "r1".into(),
            created_at: Utc::now(),
            text: "hello".into(),
            mode,
            start_context: None,
            end_context: None,
            duration_ms: 1200,
            audio_file: "utt-test.wav".into(),
            model_id: "base".into(),
            timings: StageTimings::default(),
            status: TranscriptionStatus::Success,
            error: None,
            self_frontmost: false,
            pasted_at: pasted.then(Utc::now),
        }
    }

    #[test]
    fn queued_without_paste_timestamp_is_retry_candidate() {
        assert!(record(DeliveryMode::Queued, false).is_retry_candidate());
        assert!(record(DeliveryMode::Interstitial, false).is_retry_candidate());
        assert!(record(DeliveryMode::Failed, false).is_retry_candidate());
    }

    #[test]
    fn delivered_or_pasted_records_are_not_candidates() {
        assert!(!record(DeliveryMode::Paste, true).is_retry_candidate());
        assert!(!record(DeliveryMode::Queued, true).is_retry_candidate());
        assert!(!record(DeliveryMode::Clipboard, false).is_retry_candidate());
    }
}
