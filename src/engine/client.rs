use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::error::EngineError;
use super::messages::{DownloadProgress, EngineStatus, ModelInfo};
use super::transport::{EngineChannel, EngineTransport};

/// Connection lifecycle of the engine channel.
///
/// A fresh attempt always resets to `Disconnected` first; there is no
/// direct `Connecting -> Connecting` transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// All reconnect rounds exhausted; cleared by the next attempt.
    Error,
}

/// Connection summary exposed to the control surface.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub state: ConnectionState,
    pub connected_at: Option<DateTime<Utc>>,
    pub transcription_count: u64,
}

struct ClientInner {
    state: ConnectionState,
    channel: Option<Arc<dyn EngineChannel>>,
    connected_at: Option<DateTime<Utc>>,
    transcription_count: u64,
}

/// Client for the out-of-process transcription engine.
///
/// Hides reconnect rounds and busy-retry from callers: `transcribe` either
/// returns text or a terminal error, never a transient one.
pub struct EngineClient {
    transport: Box<dyn EngineTransport>,
    inner: Mutex<ClientInner>,
}

const CONNECT_ROUNDS: u32 = 3;
const LAUNCH_WAIT: Duration = Duration::from_millis(500);
const HANDSHAKE_POLL: Duration = Duration::from_millis(100);
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
/// First-time model loads can legitimately take 60+ seconds.
const BUSY_ATTEMPTS: u32 = 30;
const BUSY_DELAY: Duration = Duration::from_secs(2);

impl EngineClient {
    pub fn new(transport: Box<dyn EngineTransport>) -> Self {
        Self {
            transport,
            inner: Mutex::new(ClientInner {
                state: ConnectionState::Disconnected,
                channel: None,
                connected_at: None,
                transcription_count: 0,
            }),
        }
    }

    pub async fn connection_info(&self) -> ConnectionInfo {
        let inner = self.inner.lock().await;
        ConnectionInfo {
            state: inner.state,
            connected_at: inner.connected_at,
            transcription_count: inner.transcription_count,
        }
    }

    pub async fn state(&self) -> ConnectionState {
        self.inner.lock().await.state
    }

    async fn channel(&self) -> Option<Arc<dyn EngineChannel>> {
        self.inner.lock().await.channel.clone()
    }

    /// Drop the channel and reset session counters. Never reconnects on its
    /// own; the next `ensure_connected` call drives reconnection.
    pub async fn handle_disconnect(&self) {
        let mut inner = self.inner.lock().await;
        if inner.channel.is_some() || inner.state != ConnectionState::Disconnected {
            info!("Engine channel disconnected");
        }
        inner.channel = None;
        inner.state = ConnectionState::Disconnected;
        inner.connected_at = None;
        inner.transcription_count = 0;
    }

    /// Establish a confirmed connection, retrying up to 3 rounds.
    ///
    /// Each round starts from a clean `Disconnected` state, launches the
    /// engine if it is not running, opens a fresh channel, and polls `ping`
    /// every 100ms for up to 2s waiting for the handshake.
    pub async fn ensure_connected(&self) -> bool {
        {
            let inner = self.inner.lock().await;
            if inner.state == ConnectionState::Connected && inner.channel.is_some() {
                return true;
            }
        }

        for round in 1..=CONNECT_ROUNDS {
            self.handle_disconnect().await;
            self.inner.lock().await.state = ConnectionState::Connecting;

            if !self.transport.engine_running().await {
                info!("Engine not running, launching");
                if let Err(e) = self.transport.launch_engine().await {
                    warn!("Failed to launch engine (round {}): {}", round, e);
                    continue;
                }
                sleep(LAUNCH_WAIT).await;
            }

            let channel: Arc<dyn EngineChannel> = match self.transport.open_channel().await {
                Ok(channel) => Arc::from(channel),
                Err(e) => {
                    warn!("Failed to open engine channel (round {}): {}", round, e);
                    continue;
                }
            };

            if Self::await_handshake(channel.as_ref()).await {
                let mut inner = self.inner.lock().await;
                inner.channel = Some(channel);
                inner.state = ConnectionState::Connected;
                inner.connected_at = Some(Utc::now());
                inner.transcription_count = 0;
                info!("Engine connected (round {})", round);
                return true;
            }

            warn!("Engine handshake timed out (round {})", round);
        }

        self.handle_disconnect().await;
        self.inner.lock().await.state = ConnectionState::Error;
        false
    }

    async fn await_handshake(channel: &dyn EngineChannel) -> bool {
        let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
        loop {
            if matches!(channel.ping().await, Ok(true)) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(HANDSHAKE_POLL).await;
        }
    }

    /// Transcribe audio bytes, masking transient busy conditions.
    ///
    /// Retries on `Busy` up to 30 times with a 2s delay between attempts;
    /// any other failure propagates immediately.
    pub async fn transcribe(&self, audio: &[u8], model_id: &str) -> Result<String, EngineError> {
        if !self.ensure_connected().await {
            return Err(EngineError::NotConnected);
        }

        let channel = self.channel().await.ok_or(EngineError::NotConnected)?;

        for attempt in 1..=BUSY_ATTEMPTS {
            match channel.transcribe(audio, model_id).await {
                Ok(text) => {
                    let mut inner = self.inner.lock().await;
                    inner.transcription_count += 1;
                    return Ok(text);
                }
                Err(e) if e.is_busy() => {
                    if attempt == BUSY_ATTEMPTS {
                        warn!("Engine still busy after {} attempts, giving up", attempt);
                        return Err(EngineError::BusyTimeout { attempts: attempt });
                    }
                    debug!(
                        "Engine busy (attempt {}/{}), retrying in {:?}",
                        attempt, BUSY_ATTEMPTS, BUSY_DELAY
                    );
                    sleep(BUSY_DELAY).await;
                }
                Err(e) => {
                    if e.invalidates_channel() {
                        self.handle_disconnect().await;
                    }
                    return Err(e);
                }
            }
        }

        Err(EngineError::BusyTimeout {
            attempts: BUSY_ATTEMPTS,
        })
    }

    // Administrative calls require an existing connection and leave state
    // unchanged unless the channel itself is invalid.

    pub async fn preload_model(&self, model_id: &str) -> Result<(), EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.preload(model_id).await;
        self.check_channel(result).await
    }

    pub async fn unload_model(&self) -> Result<(), EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.unload().await;
        self.check_channel(result).await
    }

    pub async fn download_model(&self, model_id: &str) -> Result<(), EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.download_model(model_id).await;
        self.check_channel(result).await
    }

    pub async fn cancel_download(&self) -> Result<(), EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.cancel_download().await;
        self.check_channel(result).await
    }

    pub async fn download_progress(&self) -> Result<DownloadProgress, EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.download_progress().await;
        self.check_channel(result).await
    }

    pub async fn refresh_status(&self) -> Result<EngineStatus, EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.status().await;
        self.check_channel(result).await
    }

    pub async fn refresh_available_models(&self) -> Result<Vec<ModelInfo>, EngineError> {
        let channel = self.require_channel().await?;
        let result = channel.available_models().await;
        self.check_channel(result).await
    }

    async fn require_channel(&self) -> Result<Arc<dyn EngineChannel>, EngineError> {
        self.channel().await.ok_or(EngineError::NotConnected)
    }

    async fn check_channel<T>(
        &self,
        result: Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        if let Err(e) = &result {
            if e.invalidates_channel() {
                self.handle_disconnect().await;
            }
        }
        result
    }

    /// Explicit disconnect.
    pub async fn disconnect(&self) {
        self.handle_disconnect().await;
    }
}
