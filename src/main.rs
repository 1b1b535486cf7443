use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};
use voxqueue::{
    AppState, AudioVault, ClipboardRouter, Config, EngineClient, JsonRecordStore,
    NatsEngineTransport, NoopContextSource, RecordStore, RetryQueue, SessionController,
    WavFileCaptureSource,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cfg = Config::load("config/voxqueue")?;

    info!("voxqueue v0.1.0");
    info!("Loaded config: {}", cfg.service.name);
    info!("Engine NATS URL: {}", cfg.engine.nats_url);
    info!("Model: {}", cfg.engine.model_id);

    // Explicitly constructed collaborators, wired once at startup.
    let vault = Arc::new(AudioVault::new(cfg.storage.audio_dir())?);
    let store = Arc::new(JsonRecordStore::new(cfg.storage.records_dir())?);
    let engine = Arc::new(EngineClient::new(Box::new(NatsEngineTransport::new(
        &cfg.engine.nats_url,
        &cfg.engine.subject_prefix,
    ))));
    // Simulated paste lives in the desktop shell; this binary can only
    // deliver via the clipboard.
    if cfg.delivery.mode != "clipboard" {
        warn!(
            "Delivery mode {:?} is not available here, falling back to clipboard",
            cfg.delivery.mode
        );
    }
    let router = Arc::new(ClipboardRouter);
    let context = Arc::new(NoopContextSource);

    // The real microphone source is hosted by the desktop shell; the
    // service binary replays a staged WAV, which also covers batch use.
    let capture = WavFileCaptureSource::new("capture/staged.wav");

    let controller = SessionController::new(
        engine.clone(),
        store.clone(),
        vault,
        router.clone(),
        context,
        Box::new(capture),
        cfg.engine.model_id.clone(),
    );

    let pruned = store.prune(cfg.storage.retention_hours).await?;
    if pruned > 0 {
        info!("Startup prune removed {} records", pruned);
    }

    let retry_queue = Arc::new(RetryQueue::new(store.clone(), router));
    let state = AppState::new(controller, store, retry_queue, engine);
    let app = voxqueue::create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
