use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of where the user was when a recording started or stopped.
///
/// Immutable once attached to a record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapturedContext {
    pub app_name: Option<String>,
    pub window_title: Option<String>,
    pub document_url: Option<String>,
    pub focused_text: Option<String>,
    pub captured_at: Option<DateTime<Utc>>,
}

/// Focus facts sampled at recording start.
#[derive(Debug, Clone, Default)]
pub struct FocusSnapshot {
    /// Our own UI was frontmost; forces queueing instead of delivery.
    pub self_frontmost: bool,
    /// The externally focused application, for return-to-origin delivery.
    pub previous_app: Option<String>,
}

/// Seam for the OS-level focus/window observation layer.
///
/// The real accessibility observer lives outside this crate; both calls are
/// cheap and synchronous.
pub trait ContextSource: Send + Sync {
    fn snapshot(&self) -> CapturedContext;
    fn focus(&self) -> FocusSnapshot;
}

/// Context source that reports nothing, for headless setups and tests.
#[derive(Debug, Default)]
pub struct NoopContextSource;

impl ContextSource for NoopContextSource {
    fn snapshot(&self) -> CapturedContext {
        CapturedContext {
            captured_at: Some(Utc::now()),
            ..Default::default()
        }
    }

    fn focus(&self) -> FocusSnapshot {
        FocusSnapshot::default()
    }
}
