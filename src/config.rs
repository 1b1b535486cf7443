use anyhow::Result;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub engine: EngineConfig,
    pub storage: StorageConfig,
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// NATS server URL the transcription engine listens behind
    pub nats_url: String,
    /// Subject prefix for engine requests (e.g. "stt" -> "stt.transcribe")
    pub subject_prefix: String,
    /// Model requested for transcription
    pub model_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Durable audio vault directory (append-only)
    pub audio_dir: Option<PathBuf>,
    /// Utterance record store directory
    pub records_dir: Option<PathBuf>,
    /// Records older than this are removed by prune
    pub retention_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    /// "paste" or "clipboard"
    pub mode: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl StorageConfig {
    /// Resolved audio vault directory, defaulting under the user data dir.
    pub fn audio_dir(&self) -> PathBuf {
        self.audio_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("voxqueue")
                .join("audio")
        })
    }

    /// Resolved record store directory, defaulting under the user data dir.
    pub fn records_dir(&self) -> PathBuf {
        self.records_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("voxqueue")
                .join("records")
        })
    }
}
