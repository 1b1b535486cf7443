//! Recording session controller
//!
//! The orchestrator: drives the Idle -> Listening -> Transcribing ->
//! Routing state machine, persists audio before transcription, and turns
//! every outcome after the durable write into a retrievable record.

pub mod events;
pub mod retry;
pub mod session;

pub use events::{SessionEvent, SessionState};
pub use retry::RetryQueue;
pub use session::SessionController;
