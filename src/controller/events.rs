use serde::Serialize;

/// Recording session lifecycle.
///
/// Transitions are strictly sequential:
/// `Idle -> Listening -> Transcribing -> Routing -> Idle`, with early exits
/// back to `Idle` on cancel (from Listening) or push-to-queue / terminal
/// failure (from Transcribing/Routing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Listening,
    Transcribing,
    Routing,
}

/// Emitted on every controller transition.
///
/// Observers (overlay, indicator, UI) subscribe to the controller's
/// broadcast channel instead of reading shared mutable state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "event")]
pub enum SessionEvent {
    StateChanged { state: SessionState },
    /// A record reached the store with its final shape.
    RecordFinalized { id: String },
    /// An interstitial record is ready for the external edit surface.
    InterstitialReady { id: String },
    SessionFailed { error: String },
}
