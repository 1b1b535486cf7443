//! End-to-end controller behavior with fake collaborators: capture source,
//! router, context source, and a scripted engine transport behind the real
//! `EngineClient`.

use anyhow::Result;
use chrono::Utc;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use voxqueue::engine::{
    DownloadProgress, EngineChannel, EngineClient, EngineError, EngineStatus, EngineTransport,
    ModelInfo,
};
use voxqueue::{
    AudioClip, AudioVault, CapturedContext, CaptureSource, ContextSource, DeliveryMode,
    FocusSnapshot, JsonRecordStore, RecordStore, RetryQueue, Router, SessionController,
    SessionEvent, SessionState, StageTimings, TranscriptionStatus, UtteranceRecord,
};

// ============================================================================
// Fake collaborators
// ============================================================================

#[derive(Clone)]
enum EngineBehavior {
    Text(String),
    Fail(String),
    /// Never completes within the test window; exercises push-to-queue.
    Hang,
}

struct FakeEngineChannel {
    behavior: EngineBehavior,
}

#[async_trait::async_trait]
impl EngineChannel for FakeEngineChannel {
    async fn transcribe(&self, _audio: &[u8], _model_id: &str) -> Result<String, EngineError> {
        match &self.behavior {
            EngineBehavior::Text(text) => Ok(text.clone()),
            EngineBehavior::Fail(msg) => Err(EngineError::Engine(msg.clone())),
            EngineBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(EngineError::Engine("hung".into()))
            }
        }
    }

    async fn ping(&self) -> Result<bool, EngineError> {
        Ok(true)
    }

    async fn preload(&self, _model_id: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn unload(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn status(&self) -> Result<EngineStatus, EngineError> {
        Ok(EngineStatus {
            pid: None,
            loaded_model: None,
            loading_model: false,
            transcribing: false,
            transcription_count: 0,
        })
    }

    async fn download_model(&self, _model_id: &str) -> Result<(), EngineError> {
        Ok(())
    }

    async fn download_progress(&self) -> Result<DownloadProgress, EngineError> {
        Ok(DownloadProgress {
            fraction: 0.0,
            bytes_downloaded: 0,
            bytes_total: 0,
        })
    }

    async fn cancel_download(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn available_models(&self) -> Result<Vec<ModelInfo>, EngineError> {
        Ok(Vec::new())
    }
}

struct FakeEngineTransport {
    behavior: EngineBehavior,
}

#[async_trait::async_trait]
impl EngineTransport for FakeEngineTransport {
    async fn engine_running(&self) -> bool {
        true
    }

    async fn launch_engine(&self) -> Result<(), EngineError> {
        Ok(())
    }

    async fn open_channel(&self) -> Result<Box<dyn EngineChannel>, EngineError> {
        Ok(Box::new(FakeEngineChannel {
            behavior: self.behavior.clone(),
        }))
    }
}

/// In-memory capture source delivering one preset clip per cycle.
struct FakeCaptureSource {
    clip: AudioClip,
    clip_tx: Option<mpsc::Sender<AudioClip>>,
    capturing: bool,
}

impl FakeCaptureSource {
    fn new(clip: AudioClip) -> Self {
        Self {
            clip,
            clip_tx: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl CaptureSource for FakeCaptureSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioClip>> {
        let (tx, rx) = mpsc::channel(1);
        self.clip_tx = Some(tx);
        self.capturing = true;
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;
        if let Some(tx) = self.clip_tx.take() {
            tx.send(self.clip.clone()).await.ok();
        }
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct FakeRouter {
    delivered: Arc<StdMutex<Vec<String>>>,
    fail: AtomicBool,
}

#[async_trait::async_trait]
impl Router for FakeRouter {
    async fn deliver(&self, text: &str) -> Result<DeliveryMode> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("paste target vanished");
        }
        self.delivered.lock().unwrap().push(text.to_string());
        Ok(DeliveryMode::Paste)
    }
}

struct FakeContextSource {
    self_frontmost: bool,
}

impl ContextSource for FakeContextSource {
    fn snapshot(&self) -> CapturedContext {
        CapturedContext {
            app_name: Some("editor".into()),
            window_title: Some("notes.md".into()),
            document_url: None,
            focused_text: None,
            captured_at: Some(Utc::now()),
        }
    }

    fn focus(&self) -> FocusSnapshot {
        FocusSnapshot {
            self_frontmost: self.self_frontmost,
            previous_app: Some("editor".into()),
        }
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    controller: SessionController,
    store: Arc<JsonRecordStore>,
    vault: Arc<AudioVault>,
    vault_dir: PathBuf,
    delivered: Arc<StdMutex<Vec<String>>>,
    router: Arc<FakeRouter>,
    events: broadcast::Receiver<SessionEvent>,
    _tmp: tempfile::TempDir,
}

fn two_second_clip() -> AudioClip {
    AudioClip {
        samples: vec![100i16; 32000],
        sample_rate: 16000,
        channels: 1,
        temp_path: None,
    }
}

fn harness(behavior: EngineBehavior, self_frontmost: bool) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let vault_dir = tmp.path().join("audio");
    let vault = Arc::new(AudioVault::new(&vault_dir).unwrap());
    let store = Arc::new(JsonRecordStore::new(tmp.path().join("records")).unwrap());
    let engine = Arc::new(EngineClient::new(Box::new(FakeEngineTransport { behavior })));

    let delivered = Arc::new(StdMutex::new(Vec::new()));
    let router = Arc::new(FakeRouter {
        delivered: delivered.clone(),
        fail: AtomicBool::new(false),
    });

    let controller = SessionController::new(
        engine,
        store.clone(),
        vault.clone(),
        router.clone(),
        Arc::new(FakeContextSource { self_frontmost }),
        Box::new(FakeCaptureSource::new(two_second_clip())),
        "whisper-base",
    );

    let events = controller.subscribe();

    Harness {
        controller,
        store,
        vault,
        vault_dir,
        delivered,
        router,
        events,
        _tmp: tmp,
    }
}

async fn wait_for_state(rx: &mut broadcast::Receiver<SessionEvent>, target: SessionState) {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match rx.recv().await {
                Ok(SessionEvent::StateChanged { state }) if state == target => break,
                Ok(_) => {}
                Err(e) => panic!("event stream closed: {}", e),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {:?}", target));
}

fn vault_file_count(dir: &PathBuf) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn happy_path_delivers_and_records() {
    let mut h = harness(EngineBehavior::Text("hello world".into()), false);

    h.controller.toggle(false).await.unwrap();
    assert_eq!(h.controller.state().await, SessionState::Listening);

    h.controller.toggle(false).await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let records = h.store.all().await.unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.text, "hello world");
    assert_eq!(record.mode, DeliveryMode::Paste);
    assert_eq!(record.status, TranscriptionStatus::Success);
    assert!(record.pasted_at.is_some());
    assert_eq!(record.duration_ms, 2000);
    assert_eq!(record.model_id, "whisper-base");
    assert!(record.start_context.is_some());
    assert!(record.end_context.is_some());

    assert_eq!(h.delivered.lock().unwrap().as_slice(), ["hello world"]);

    // Durability: the referenced vault file exists and holds the captured
    // samples byte for byte.
    let stored = h.vault.load(&record.audio_file).unwrap();
    assert_eq!(stored.samples, two_second_clip().samples);
}

#[tokio::test]
async fn self_frontmost_sessions_are_queued_not_delivered() {
    let mut h = harness(EngineBehavior::Text("hello world".into()), true);

    h.controller.toggle(false).await.unwrap();
    h.controller.toggle(false).await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let records = h.store.all().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mode, DeliveryMode::Queued);
    assert!(records[0].pasted_at.is_none());
    assert!(records[0].self_frontmost);

    assert!(h.delivered.lock().unwrap().is_empty());
    // And by definition it is a retry candidate.
    assert_eq!(h.store.queued_or_failed().await.unwrap().len(), 1);
}

#[tokio::test]
async fn interstitial_sessions_hand_off_to_the_edit_surface() {
    let mut h = harness(EngineBehavior::Text("draft reply".into()), false);

    h.controller.toggle(false).await.unwrap();
    h.controller.toggle(true).await.unwrap();

    let mut saw_interstitial_ready = false;
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match h.events.recv().await.unwrap() {
                SessionEvent::InterstitialReady { .. } => saw_interstitial_ready = true,
                SessionEvent::StateChanged {
                    state: SessionState::Idle,
                } => break,
                _ => {}
            }
        }
    })
    .await
    .unwrap();
    assert!(saw_interstitial_ready);

    let records = h.store.all().await.unwrap();
    assert_eq!(records[0].mode, DeliveryMode::Interstitial);
    assert!(records[0].pasted_at.is_none());
    assert!(h.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn engine_failure_preserves_audio_in_a_failed_record() {
    let mut h = harness(EngineBehavior::Fail("model crashed".into()), false);

    h.controller.toggle(false).await.unwrap();
    h.controller.toggle(false).await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let records = h.store.all().await.unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.status, TranscriptionStatus::Failed);
    assert_eq!(record.mode, DeliveryMode::Failed);
    assert!(record.error.as_deref().unwrap().contains("model crashed"));
    assert!(record.pasted_at.is_none());

    // The captured audio survives the failure.
    assert!(h.vault.load(&record.audio_file).is_ok());
    assert!(h.delivered.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_while_listening_leaves_no_trace() {
    let mut h = harness(EngineBehavior::Text("discarded".into()), false);

    h.controller.toggle(false).await.unwrap();
    h.controller.cancel().await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    // Give the completion task a chance to observe the cancel flag.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.controller.state().await, SessionState::Idle);
    assert_eq!(h.store.count().await.unwrap(), 0);
    assert_eq!(vault_file_count(&h.vault_dir), 0);
}

#[tokio::test]
async fn push_to_queue_converts_the_inflight_session() {
    let mut h = harness(EngineBehavior::Hang, false);

    h.controller.toggle(false).await.unwrap();
    h.controller.toggle(false).await.unwrap();
    wait_for_state(&mut h.events, SessionState::Transcribing).await;

    // A normal toggle must not interrupt processing.
    h.controller.toggle(false).await.unwrap();
    assert_eq!(h.controller.state().await, SessionState::Transcribing);

    h.controller.push_to_queue().await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let records = h.store.all().await.unwrap();
    assert_eq!(records.len(), 1);

    let record = &records[0];
    assert_eq!(record.status, TranscriptionStatus::Pending);
    assert_eq!(record.mode, DeliveryMode::Queued);
    assert!(record.pasted_at.is_none());
    assert!(h.vault.load(&record.audio_file).is_ok());

    assert_eq!(h.controller.state().await, SessionState::Idle);
}

#[tokio::test]
async fn a_second_start_cannot_open_a_concurrent_session() {
    let mut h = harness(EngineBehavior::Text("only once".into()), false);

    h.controller.toggle(false).await.unwrap();
    // Out-of-order press events while already listening are no-ops.
    h.controller.press_to_talk_start().await.unwrap();
    assert_eq!(h.controller.state().await, SessionState::Listening);

    h.controller.press_to_talk_release().await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    assert_eq!(h.store.count().await.unwrap(), 1);
    assert_eq!(h.delivered.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn delivery_failure_downgrades_to_a_queued_record() {
    let mut h = harness(EngineBehavior::Text("precious words".into()), false);
    h.router.fail.store(true, Ordering::SeqCst);

    h.controller.toggle(false).await.unwrap();
    h.controller.toggle(false).await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let records = h.store.all().await.unwrap();
    assert_eq!(records[0].mode, DeliveryMode::Queued);
    assert_eq!(records[0].text, "precious words");
    assert!(records[0].pasted_at.is_none());
}

#[tokio::test]
async fn resubmit_redrives_transcription_from_stored_audio() {
    let mut h = harness(EngineBehavior::Text("recovered text".into()), false);

    // Seed a failed record pointing at durable audio, as a crashed engine
    // run would have left behind.
    let audio_file = h.vault.persist(&two_second_clip()).unwrap();
    let failed = UtteranceRecord {
        id: "failed-1".into(),
        created_at: Utc::now(),
        text: "queued for retry".into(),
        mode: DeliveryMode::Failed,
        start_context: None,
        end_context: None,
        duration_ms: 2000,
        audio_file,
        model_id: "whisper-base".into(),
        timings: StageTimings::default(),
        status: TranscriptionStatus::Failed,
        error: Some("model crashed".into()),
        self_frontmost: false,
        pasted_at: None,
    };
    h.store.store(&failed).await.unwrap();

    h.controller.resubmit("failed-1").await.unwrap();
    wait_for_state(&mut h.events, SessionState::Idle).await;

    let record = h.store.fetch("failed-1").await.unwrap().unwrap();
    assert_eq!(record.status, TranscriptionStatus::Success);
    assert_eq!(record.text, "recovered text");
    assert_eq!(record.mode, DeliveryMode::Paste);
    assert!(record.pasted_at.is_some());
    assert!(h.store.queued_or_failed().await.unwrap().is_empty());
}

#[tokio::test]
async fn redelivery_marks_the_record_and_never_retranscribes() {
    let h = harness(EngineBehavior::Fail("engine must not be called".into()), false);
    let queue = RetryQueue::new(h.store.clone(), h.router.clone());

    let queued = UtteranceRecord {
        id: "queued-1".into(),
        created_at: Utc::now(),
        text: "held back".into(),
        mode: DeliveryMode::Queued,
        start_context: None,
        end_context: None,
        duration_ms: 1000,
        audio_file: "utt-held.wav".into(),
        model_id: "whisper-base".into(),
        timings: StageTimings::default(),
        status: TranscriptionStatus::Success,
        error: None,
        self_frontmost: true,
        pasted_at: None,
    };
    h.store.store(&queued).await.unwrap();
    assert_eq!(queue.candidates().await.unwrap().len(), 1);

    let redelivered = queue.redeliver("queued-1").await.unwrap();
    assert!(redelivered.pasted_at.is_some());
    assert_eq!(h.delivered.lock().unwrap().as_slice(), ["held back"]);
    assert!(queue.candidates().await.unwrap().is_empty());
}
