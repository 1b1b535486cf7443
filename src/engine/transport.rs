use base64::Engine as _;
use serde::{de::DeserializeOwned, Serialize};
use tracing::info;

use super::error::EngineError;
use super::messages::{
    DownloadProgress, EngineReply, EngineErrorKind, EngineStatus, ModelInfo, TranscribeRequest,
    TranscribeResponse,
};

/// One open request/reply channel to the engine.
///
/// Every operation returns either a success payload or a structured error;
/// nothing at this boundary fails silently.
#[async_trait::async_trait]
pub trait EngineChannel: Send + Sync {
    async fn transcribe(&self, audio: &[u8], model_id: &str) -> Result<String, EngineError>;
    async fn ping(&self) -> Result<bool, EngineError>;
    async fn preload(&self, model_id: &str) -> Result<(), EngineError>;
    async fn unload(&self) -> Result<(), EngineError>;
    async fn status(&self) -> Result<EngineStatus, EngineError>;
    async fn download_model(&self, model_id: &str) -> Result<(), EngineError>;
    async fn download_progress(&self) -> Result<DownloadProgress, EngineError>;
    async fn cancel_download(&self) -> Result<(), EngineError>;
    async fn available_models(&self) -> Result<Vec<ModelInfo>, EngineError>;
}

/// Connection factory for the engine channel.
///
/// Each reconnect round opens a fresh channel; stale channels are simply
/// dropped.
#[async_trait::async_trait]
pub trait EngineTransport: Send + Sync {
    /// Whether the engine process is believed to be running.
    async fn engine_running(&self) -> bool;

    /// Ask the environment to launch the engine process.
    async fn launch_engine(&self) -> Result<(), EngineError>;

    async fn open_channel(&self) -> Result<Box<dyn EngineChannel>, EngineError>;
}

/// NATS transport: engine requests are JSON request/reply on
/// `<prefix>.<operation>` subjects.
pub struct NatsEngineTransport {
    url: String,
    subject_prefix: String,
}

impl NatsEngineTransport {
    pub fn new(url: impl Into<String>, subject_prefix: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            subject_prefix: subject_prefix.into(),
        }
    }
}

#[async_trait::async_trait]
impl EngineTransport for NatsEngineTransport {
    async fn engine_running(&self) -> bool {
        // The engine is supervised externally; reachability is probed via
        // ping during the handshake instead.
        true
    }

    async fn launch_engine(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn open_channel(&self) -> Result<Box<dyn EngineChannel>, EngineError> {
        info!("Connecting to NATS at {}", self.url);

        let client = async_nats::connect(&self.url)
            .await
            .map_err(|e| EngineError::Channel(format!("Failed to connect to NATS: {}", e)))?;

        info!("Connected to NATS successfully");

        Ok(Box::new(NatsEngineChannel {
            client,
            subject_prefix: self.subject_prefix.clone(),
        }))
    }
}

pub struct NatsEngineChannel {
    client: async_nats::Client,
    subject_prefix: String,
}

impl NatsEngineChannel {
    async fn request<Req: Serialize, Resp: DeserializeOwned>(
        &self,
        operation: &str,
        body: &Req,
    ) -> Result<Resp, EngineError> {
        let subject = format!("{}.{}", self.subject_prefix, operation);

        let payload = serde_json::to_vec(body)
            .map_err(|e| EngineError::Channel(format!("Failed to encode request: {}", e)))?;

        let message = self
            .client
            .request(subject.clone(), payload.into())
            .await
            .map_err(|e| EngineError::Channel(format!("Request to {} failed: {}", subject, e)))?;

        let reply: EngineReply<Resp> = serde_json::from_slice(&message.payload)
            .map_err(|e| EngineError::Channel(format!("Bad reply on {}: {}", subject, e)))?;

        match reply {
            EngineReply::Ok { payload } => Ok(payload),
            EngineReply::Error { kind, message } => Err(match kind {
                EngineErrorKind::Busy => EngineError::Busy(message),
                EngineErrorKind::Failed => EngineError::Engine(message),
            }),
        }
    }
}

#[async_trait::async_trait]
impl EngineChannel for NatsEngineChannel {
    async fn transcribe(&self, audio: &[u8], model_id: &str) -> Result<String, EngineError> {
        let request = TranscribeRequest {
            audio: base64::engine::general_purpose::STANDARD.encode(audio),
            model_id: model_id.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        let response: TranscribeResponse = self.request("transcribe", &request).await?;
        Ok(response.text)
    }

    async fn ping(&self) -> Result<bool, EngineError> {
        self.request("ping", &()).await
    }

    async fn preload(&self, model_id: &str) -> Result<(), EngineError> {
        self.request("preload", &model_id).await
    }

    async fn unload(&self) -> Result<(), EngineError> {
        self.request("unload", &()).await
    }

    async fn status(&self) -> Result<EngineStatus, EngineError> {
        self.request("status", &()).await
    }

    async fn download_model(&self, model_id: &str) -> Result<(), EngineError> {
        self.request("download", &model_id).await
    }

    async fn download_progress(&self) -> Result<DownloadProgress, EngineError> {
        self.request("download_progress", &()).await
    }

    async fn cancel_download(&self) -> Result<(), EngineError> {
        self.request("cancel_download", &()).await
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>, EngineError> {
        self.request("models", &()).await
    }
}
