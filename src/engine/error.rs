use thiserror::Error;

/// Transcription client errors.
///
/// Busy and terminal conditions are separate variants so retry policy never
/// has to match on message wording.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not connected to transcription engine")]
    NotConnected,

    #[error("Engine channel failure: {0}")]
    Channel(String),

    #[error("Engine busy: {0}")]
    Busy(String),

    #[error("Engine still busy after {attempts} attempts")]
    BusyTimeout { attempts: u32 },

    #[error("Transcription failed: {0}")]
    Engine(String),
}

impl EngineError {
    /// True for the transient condition the client retries transparently.
    pub fn is_busy(&self) -> bool {
        matches!(self, EngineError::Busy(_))
    }

    /// Channel-level failures invalidate the connection itself.
    pub fn invalidates_channel(&self) -> bool {
        matches!(self, EngineError::Channel(_))
    }
}
