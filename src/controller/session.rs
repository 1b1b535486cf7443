use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use super::events::{SessionEvent, SessionState};
use crate::audio::{AudioClip, AudioVault, CaptureSource};
use crate::context::{CapturedContext, ContextSource};
use crate::delivery::Router;
use crate::engine::EngineClient;
use crate::records::{
    DeliveryMode, RecordStore, StageTimings, TranscriptionStatus, UtteranceRecord,
    PLACEHOLDER_TEXT,
};

/// Per-session facts gathered while listening.
struct ListeningSession {
    started_at: Instant,
    interstitial: bool,
    self_frontmost: bool,
    previous_app: Option<String>,
    start_context: CapturedContext,
}

/// Everything needed to finalize a record once audio is durable.
///
/// Held by the controller only while Transcribing/Routing, so
/// `push_to_queue` can write a pending record after aborting the engine
/// task.
#[derive(Clone)]
struct PendingUtterance {
    record_id: String,
    created_at: DateTime<Utc>,
    audio_file: String,
    duration_ms: u64,
    interstitial: bool,
    self_frontmost: bool,
    start_context: Option<CapturedContext>,
    end_context: Option<CapturedContext>,
}

struct Inner {
    state: SessionState,
    listening: Option<ListeningSession>,
    pending: Option<PendingUtterance>,
    /// Handle of the spawned transcription pipeline, abortable by
    /// push-to-queue. The remote call is abandoned, never waited on.
    processing_task: Option<JoinHandle<()>>,
    /// Cooperative cancel flag for the current session; replaced at begin.
    cancelled: Arc<AtomicBool>,
}

/// The recording session controller.
///
/// One instance per process; sequences capture -> transcription -> delivery
/// and guarantees captured audio is durable before any transcription is
/// attempted. Collaborators are injected at construction so tests can
/// substitute fakes.
#[derive(Clone)]
pub struct SessionController {
    engine: Arc<EngineClient>,
    store: Arc<dyn RecordStore>,
    vault: Arc<AudioVault>,
    router: Arc<dyn Router>,
    context: Arc<dyn ContextSource>,
    capture: Arc<Mutex<Box<dyn CaptureSource>>>,
    model_id: String,
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<EngineClient>,
        store: Arc<dyn RecordStore>,
        vault: Arc<AudioVault>,
        router: Arc<dyn Router>,
        context: Arc<dyn ContextSource>,
        capture: Box<dyn CaptureSource>,
        model_id: impl Into<String>,
    ) -> Self {
        let (events, _) = broadcast::channel(64);

        Self {
            engine,
            store,
            vault,
            router,
            context,
            capture: Arc::new(Mutex::new(capture)),
            model_id: model_id.into(),
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Idle,
                listening: None,
                pending: None,
                processing_task: None,
                cancelled: Arc::new(AtomicBool::new(false)),
            })),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine; events are best-effort notifications.
        let _ = self.events.send(event);
    }

    fn emit_state(&self, state: SessionState) {
        self.emit(SessionEvent::StateChanged { state });
    }

    /// Toggle-style trigger: begin from Idle, end capture from Listening.
    /// A no-op while processing, so a stray tap cannot interrupt a session
    /// already past capture.
    pub async fn toggle(&self, interstitial: bool) -> Result<()> {
        let state = self.state().await;
        match state {
            SessionState::Idle => self.begin().await,
            SessionState::Listening => self.finish(interstitial).await,
            SessionState::Transcribing | SessionState::Routing => {
                info!("Toggle ignored while {:?}", state);
                Ok(())
            }
        }
    }

    /// Press-to-talk press: begins only from Idle, guarding against
    /// out-of-order key events.
    pub async fn press_to_talk_start(&self) -> Result<()> {
        if self.state().await != SessionState::Idle {
            return Ok(());
        }
        self.begin().await
    }

    /// Press-to-talk release: ends only from Listening.
    pub async fn press_to_talk_release(&self) -> Result<()> {
        if self.state().await != SessionState::Listening {
            return Ok(());
        }
        self.finish(false).await
    }

    /// Abandon a session while still listening. No record is produced and
    /// no audio is persisted, since capture never completed.
    pub async fn cancel(&self) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Listening {
                return Ok(());
            }

            info!("Session cancelled while listening");
            inner.cancelled.store(true, Ordering::SeqCst);
            inner.listening = None;
            inner.state = SessionState::Idle;
        }

        // Best-effort stop; any clip the source still compiles is discarded
        // by the completion task via the cancel flag.
        let mut capture = self.capture.lock().await;
        if capture.is_capturing() {
            if let Err(e) = capture.stop().await {
                warn!("Capture stop after cancel failed: {}", e);
            }
        }

        self.emit_state(SessionState::Idle);
        Ok(())
    }

    /// Escape hatch while the engine is slow: abort the in-flight
    /// transcription, persist a pending record referencing the durable
    /// audio, and return to Idle.
    pub async fn push_to_queue(&self) -> Result<()> {
        let pending = {
            let mut inner = self.inner.lock().await;
            if !matches!(
                inner.state,
                SessionState::Transcribing | SessionState::Routing
            ) {
                return Ok(());
            }

            if let Some(task) = inner.processing_task.take() {
                task.abort();
            }

            let pending = inner
                .pending
                .take()
                .context("No in-flight utterance to queue")?;

            inner.state = SessionState::Idle;
            inner.listening = None;
            pending
        };

        info!(
            "Pushed in-flight session to queue (audio: {})",
            pending.audio_file
        );

        let record = UtteranceRecord {
            id: pending.record_id.clone(),
            created_at: pending.created_at,
            text: PLACEHOLDER_TEXT.to_string(),
            mode: DeliveryMode::Queued,
            start_context: pending.start_context,
            end_context: pending.end_context,
            duration_ms: pending.duration_ms,
            audio_file: pending.audio_file,
            model_id: self.model_id.clone(),
            timings: StageTimings::default(),
            status: TranscriptionStatus::Pending,
            error: None,
            self_frontmost: pending.self_frontmost,
            pasted_at: None,
        };

        self.store.store(&record).await?;
        self.emit(SessionEvent::RecordFinalized {
            id: record.id.clone(),
        });
        self.emit_state(SessionState::Idle);
        Ok(())
    }

    /// Begin a session: snapshot focus and context, start capture, and
    /// arrange for the compiled clip to feed the processing pipeline.
    async fn begin(&self) -> Result<()> {
        let cancelled = Arc::new(AtomicBool::new(false));

        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Idle {
                warn!("Begin ignored: controller is {:?}", inner.state);
                return Ok(());
            }

            let focus = self.context.focus();
            let start_context = self.context.snapshot();

            inner.listening = Some(ListeningSession {
                started_at: Instant::now(),
                interstitial: false,
                self_frontmost: focus.self_frontmost,
                previous_app: focus.previous_app,
                start_context,
            });
            inner.cancelled = cancelled.clone();
            inner.state = SessionState::Listening;
        }

        let clip_rx = {
            let mut capture = self.capture.lock().await;
            match capture.start().await {
                Ok(rx) => rx,
                Err(e) => {
                    error!("Failed to start capture: {}", e);
                    self.reset_to_idle().await;
                    self.emit(SessionEvent::SessionFailed {
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            }
        };

        info!("Listening");
        self.emit_state(SessionState::Listening);

        let controller = self.clone();
        let completion = tokio::spawn(async move {
            let mut clip_rx = clip_rx;
            if let Some(clip) = clip_rx.recv().await {
                if cancelled.load(Ordering::SeqCst) {
                    info!("Discarding clip from cancelled session");
                    return;
                }
                controller.process(clip).await;
            }
        });

        self.inner.lock().await.processing_task = Some(completion);
        Ok(())
    }

    /// End capture; the compiled clip arrives via the completion task.
    async fn finish(&self, interstitial: bool) -> Result<()> {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Listening {
                return Ok(());
            }
            if let Some(listening) = &mut inner.listening {
                listening.interstitial = interstitial;
            }
        }

        let mut capture = self.capture.lock().await;
        if let Err(e) = capture.stop().await {
            error!("Failed to stop capture: {}", e);
            drop(capture);
            self.reset_to_idle().await;
            self.emit(SessionEvent::SessionFailed {
                error: e.to_string(),
            });
            return Err(e);
        }

        Ok(())
    }

    /// The post-capture pipeline: durable copy first, then transcription,
    /// then routing. Every terminal failure after the durable copy leaves a
    /// retrievable record.
    async fn process(&self, clip: AudioClip) {
        let pipeline_started = Instant::now();

        // Step 1: durable copy. Nothing else may proceed without it.
        let audio_file = match self.vault.persist(&clip) {
            Ok(filename) => filename,
            Err(e) => {
                error!("Durable audio write failed, aborting session: {:#}", e);
                self.reset_to_idle().await;
                self.emit(SessionEvent::SessionFailed {
                    error: format!("durable audio write failed: {}", e),
                });
                return;
            }
        };

        // Step 2: the raw artifact is no longer needed.
        if let Some(temp) = &clip.temp_path {
            if let Err(e) = fs::remove_file(temp) {
                warn!("Failed to remove raw capture artifact: {}", e);
            }
        }

        // Step 3: refresh end context.
        let end_context = self.context.snapshot();

        let (pending, cancelled) = {
            let mut inner = self.inner.lock().await;
            let listening = inner.listening.take();
            let (interstitial, self_frontmost, start_context) = match listening {
                Some(l) => {
                    info!(
                        "Capture complete after {}ms (previous app: {:?})",
                        l.started_at.elapsed().as_millis(),
                        l.previous_app
                    );
                    (l.interstitial, l.self_frontmost, Some(l.start_context))
                }
                None => (false, false, None),
            };

            let pending = PendingUtterance {
                record_id: uuid::Uuid::new_v4().to_string(),
                created_at: Utc::now(),
                audio_file: audio_file.clone(),
                duration_ms: clip.duration_ms(),
                interstitial,
                self_frontmost,
                start_context,
                end_context: Some(end_context),
            };

            inner.pending = Some(pending.clone());
            inner.state = SessionState::Transcribing;
            (pending, inner.cancelled.clone())
        };

        info!("Transcribing {} ({}ms of audio)", audio_file, pending.duration_ms);
        self.emit_state(SessionState::Transcribing);

        let pre_engine_ms = pipeline_started.elapsed().as_millis() as u64;
        self.transcribe_and_route(pending, cancelled, pre_engine_ms)
            .await;
    }

    /// Step 4 onward: engine call, cancel-race check, routing, persistence.
    /// Shared by the live pipeline and resubmission of stored audio.
    async fn transcribe_and_route(
        &self,
        pending: PendingUtterance,
        cancelled: Arc<AtomicBool>,
        pre_engine_ms: u64,
    ) {
        let audio_bytes = match self.vault.read_bytes(&pending.audio_file) {
            Ok(bytes) => bytes,
            Err(e) => {
                self.finalize_failure(&pending, pre_engine_ms, 0, &format!("{:#}", e))
                    .await;
                return;
            }
        };

        let engine_started = Instant::now();
        let result = self.engine.transcribe(&audio_bytes, &self.model_id).await;
        let engine_ms = engine_started.elapsed().as_millis() as u64;

        // Cancellation may have raced with a just-completed transcription;
        // suppress delivery without raising an error.
        if cancelled.load(Ordering::SeqCst) {
            info!("Cancellation raced with transcription; discarding result");
            self.reset_to_idle().await;
            return;
        }

        match result {
            Ok(text) => {
                self.route(&pending, text, pre_engine_ms, engine_ms).await;
            }
            Err(e) => {
                warn!("Transcription failed: {}", e);
                self.finalize_failure(&pending, pre_engine_ms, engine_ms, &e.to_string())
                    .await;
            }
        }
    }

    /// Step 5: classify the delivery mode and persist the final record.
    async fn route(
        &self,
        pending: &PendingUtterance,
        text: String,
        pre_engine_ms: u64,
        engine_ms: u64,
    ) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Routing;
        }
        self.emit_state(SessionState::Routing);

        let routing_started = Instant::now();

        let (mode, pasted_at) = if pending.interstitial {
            (DeliveryMode::Interstitial, None)
        } else if pending.self_frontmost {
            info!("Own UI was frontmost at start; queueing instead of delivering");
            (DeliveryMode::Queued, None)
        } else {
            match self.router.deliver(&text).await {
                Ok(mode) => (mode, Some(Utc::now())),
                Err(e) => {
                    // Delivery failure must not lose the transcript.
                    warn!("Delivery failed, queueing text instead: {:#}", e);
                    (DeliveryMode::Queued, None)
                }
            }
        };

        let post_engine_ms = routing_started.elapsed().as_millis() as u64;
        let record = UtteranceRecord {
            id: pending.record_id.clone(),
            created_at: pending.created_at,
            text,
            mode,
            start_context: pending.start_context.clone(),
            end_context: pending.end_context.clone(),
            duration_ms: pending.duration_ms,
            audio_file: pending.audio_file.clone(),
            model_id: self.model_id.clone(),
            timings: StageTimings {
                pre_engine_ms,
                engine_ms,
                post_engine_ms,
                total_ms: pre_engine_ms + engine_ms + post_engine_ms,
            },
            status: TranscriptionStatus::Success,
            error: None,
            self_frontmost: pending.self_frontmost,
            pasted_at,
        };

        if let Err(e) = self.store.store(&record).await {
            error!("Failed to persist record {}: {:#}", record.id, e);
        } else if mode == DeliveryMode::Interstitial {
            self.emit(SessionEvent::InterstitialReady {
                id: record.id.clone(),
            });
        } else {
            self.emit(SessionEvent::RecordFinalized {
                id: record.id.clone(),
            });
        }

        self.reset_to_idle().await;
    }

    /// Step 6: transcription failed after the audio was already durable.
    /// The audio is preserved and the record is retrievable for retry.
    async fn finalize_failure(
        &self,
        pending: &PendingUtterance,
        pre_engine_ms: u64,
        engine_ms: u64,
        error_text: &str,
    ) {
        let record = UtteranceRecord {
            id: pending.record_id.clone(),
            created_at: pending.created_at,
            text: PLACEHOLDER_TEXT.to_string(),
            mode: DeliveryMode::Failed,
            start_context: pending.start_context.clone(),
            end_context: pending.end_context.clone(),
            duration_ms: pending.duration_ms,
            audio_file: pending.audio_file.clone(),
            model_id: self.model_id.clone(),
            timings: StageTimings {
                pre_engine_ms,
                engine_ms,
                post_engine_ms: 0,
                total_ms: pre_engine_ms + engine_ms,
            },
            status: TranscriptionStatus::Failed,
            error: Some(error_text.to_string()),
            self_frontmost: pending.self_frontmost,
            pasted_at: None,
        };

        if let Err(e) = self.store.store(&record).await {
            error!("Failed to persist failure record {}: {:#}", record.id, e);
        } else {
            self.emit(SessionEvent::RecordFinalized {
                id: record.id.clone(),
            });
        }

        self.emit(SessionEvent::SessionFailed {
            error: error_text.to_string(),
        });
        self.reset_to_idle().await;
    }

    /// Step 7: clear all per-session transient state.
    async fn reset_to_idle(&self) {
        {
            let mut inner = self.inner.lock().await;
            inner.state = SessionState::Idle;
            inner.listening = None;
            inner.pending = None;
            inner.processing_task = None;
        }
        self.emit_state(SessionState::Idle);
    }

    /// Re-drive the transcription pipeline for a stored record, reusing its
    /// durable audio. Valid only from Idle; the result replaces the record
    /// through the store's update path.
    pub async fn resubmit(&self, record_id: &str) -> Result<()> {
        let record = self
            .store
            .fetch(record_id)
            .await?
            .with_context(|| format!("No record with id {}", record_id))?;

        let (pending, cancelled) = {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Idle {
                anyhow::bail!("Controller is busy ({:?})", inner.state);
            }

            let pending = PendingUtterance {
                record_id: record.id.clone(),
                created_at: record.created_at,
                audio_file: record.audio_file.clone(),
                duration_ms: record.duration_ms,
                interstitial: record.mode == DeliveryMode::Interstitial,
                self_frontmost: false,
                start_context: record.start_context.clone(),
                end_context: record.end_context.clone(),
            };

            inner.cancelled = Arc::new(AtomicBool::new(false));
            inner.pending = Some(pending.clone());
            inner.state = SessionState::Transcribing;
            (pending, inner.cancelled.clone())
        };

        info!("Resubmitting record {} ({})", record.id, record.audio_file);
        self.emit_state(SessionState::Transcribing);

        let controller = self.clone();
        let task = tokio::spawn(async move {
            controller.transcribe_and_route(pending, cancelled, 0).await;
        });

        self.inner.lock().await.processing_task = Some(task);
        Ok(())
    }
}
