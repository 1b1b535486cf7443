//! Transcription engine client
//!
//! The engine runs out of process and is reached over a request/reply
//! channel (NATS in production, fakes in tests). This module owns the
//! connection state machine, the reconnect rounds, and the bounded
//! busy-retry loop that masks model-load delays from the controller.

pub mod client;
pub mod error;
pub mod messages;
pub mod transport;

pub use client::{ConnectionInfo, ConnectionState, EngineClient};
pub use error::EngineError;
pub use messages::{
    DownloadProgress, EngineReply, EngineErrorKind, EngineStatus, ModelInfo, TranscribeRequest,
    TranscribeResponse,
};
pub use transport::{EngineChannel, EngineTransport, NatsEngineTransport};
