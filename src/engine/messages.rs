use serde::{Deserialize, Serialize};

/// Transcription request sent to the engine
#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeRequest {
    /// Base64-encoded audio bytes (WAV)
    pub audio: String,
    pub model_id: String,
    pub timestamp: String, // RFC3339 timestamp
}

/// Reply to any engine request: a payload or a structured error.
///
/// The busy/terminal distinction is carried as a discriminant, never
/// inferred from the message text.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum EngineReply<T> {
    Ok { payload: T },
    Error { kind: EngineErrorKind, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineErrorKind {
    /// Engine is loading a model or already transcribing; retryable
    Busy,
    /// Terminal engine failure; not retryable
    Failed,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Serialized engine status blob
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineStatus {
    pub pid: Option<u32>,
    pub loaded_model: Option<String>,
    pub loading_model: bool,
    pub transcribing: bool,
    pub transcription_count: u64,
}

/// Model download progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadProgress {
    /// 0.0 to 1.0
    pub fraction: f64,
    pub bytes_downloaded: u64,
    pub bytes_total: u64,
}

/// One entry from the engine's model catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub family: String,
    pub display_name: String,
    pub size_description: String,
    pub downloaded: bool,
    pub loaded: bool,
}
