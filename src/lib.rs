pub mod audio;
pub mod config;
pub mod context;
pub mod controller;
pub mod delivery;
pub mod engine;
pub mod http;
pub mod records;

pub use audio::{AudioClip, AudioVault, CaptureSource, WavFileCaptureSource};
pub use config::Config;
pub use context::{CapturedContext, ContextSource, FocusSnapshot, NoopContextSource};
pub use controller::{RetryQueue, SessionController, SessionEvent, SessionState};
pub use delivery::{ClipboardRouter, Router};
pub use engine::{
    ConnectionState, EngineChannel, EngineClient, EngineError, EngineTransport,
    NatsEngineTransport,
};
pub use http::{create_router, AppState};
pub use records::{
    DeliveryMode, JsonRecordStore, RecordStore, StageTimings, TranscriptionStatus,
    UtteranceRecord,
};
