use anyhow::{Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::info;

/// One compiled recording, delivered when capture stops.
///
/// Samples are 16-bit PCM, interleaved.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
    /// Raw artifact the capture source staged the clip in, if any.
    /// Removed by the pipeline once the clip is durably persisted.
    pub temp_path: Option<PathBuf>,
}

impl AudioClip {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0;
        }
        let frames = self.samples.len() as u64 / self.channels as u64;
        frames * 1000 / self.sample_rate as u64
    }
}

/// Audio capture seam.
///
/// The physical microphone implementation lives outside this crate; anything
/// that can hand back one compiled clip per start/stop cycle fits here.
/// No clip is delivered if capture was cancelled before any data existed.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Begin capturing. The returned channel yields exactly one clip when
    /// capture stops.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioClip>>;

    /// Stop capturing and compile the clip.
    async fn stop(&mut self) -> Result<()>;

    fn is_capturing(&self) -> bool;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Capture source that replays a WAV file as its single clip.
///
/// Used for batch resubmission and headless testing, where no live
/// microphone is available.
pub struct WavFileCaptureSource {
    path: PathBuf,
    capturing: bool,
    clip_tx: Option<mpsc::Sender<AudioClip>>,
}

impl WavFileCaptureSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            capturing: false,
            clip_tx: None,
        }
    }

    fn read_clip(path: &Path) -> Result<AudioClip> {
        let reader = WavReader::open(path)
            .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        Ok(AudioClip {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            temp_path: None,
        })
    }
}

#[async_trait::async_trait]
impl CaptureSource for WavFileCaptureSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioClip>> {
        let (tx, rx) = mpsc::channel(1);
        self.clip_tx = Some(tx);
        self.capturing = true;
        info!("File capture started: {}", self.path.display());
        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        self.capturing = false;

        let clip = Self::read_clip(&self.path)?;
        info!(
            "File capture stopped: {:.1}s, {}Hz, {} channels",
            clip.duration_ms() as f64 / 1000.0,
            clip.sample_rate,
            clip.channels
        );

        if let Some(tx) = self.clip_tx.take() {
            tx.send(clip)
                .await
                .map_err(|_| anyhow::anyhow!("Clip receiver dropped before capture stopped"))?;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "wav-file"
    }
}
