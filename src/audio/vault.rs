use anyhow::{Context, Result};
use hound::{WavReader, WavSpec, WavWriter};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::capture::AudioClip;

/// Append-only durable audio storage.
///
/// A clip is copied here immediately after capture stops, before anything
/// else in the pipeline runs. Files are written exactly once under a fresh
/// name and afterwards only read, so a recording survives even if every
/// later step fails or the process crashes.
pub struct AudioVault {
    dir: PathBuf,
}

impl AudioVault {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create audio vault directory: {}", dir.display()))?;

        info!("Audio vault ready: {}", dir.display());

        Ok(Self { dir })
    }

    /// Write a clip under a fresh filename and return that filename.
    pub fn persist(&self, clip: &AudioClip) -> Result<String> {
        let filename = format!(
            "utt-{}-{}.wav",
            chrono::Utc::now().format("%Y%m%d-%H%M%S"),
            uuid::Uuid::new_v4()
        );
        let path = self.dir.join(&filename);

        let spec = WavSpec {
            channels: clip.channels,
            sample_rate: clip.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::create(&path, spec)
            .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

        for &sample in &clip.samples {
            writer
                .write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }

        writer.finalize().context("Failed to finalize WAV file")?;

        info!(
            "Persisted audio: {} ({:.1}s, {} samples)",
            filename,
            clip.duration_ms() as f64 / 1000.0,
            clip.samples.len()
        );

        Ok(filename)
    }

    /// Read a previously persisted clip back.
    pub fn load(&self, filename: &str) -> Result<AudioClip> {
        let path = self.dir.join(filename);
        let reader = WavReader::open(&path)
            .with_context(|| format!("Failed to open vault audio: {}", path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read vault audio samples")?;

        Ok(AudioClip {
            samples,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            temp_path: None,
        })
    }

    /// Raw file bytes, as sent to the transcription engine.
    pub fn read_bytes(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(filename);
        fs::read(&path).with_context(|| format!("Failed to read vault audio: {}", path.display()))
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(samples: Vec<i16>) -> AudioClip {
        AudioClip {
            samples,
            sample_rate: 16000,
            channels: 1,
            temp_path: None,
        }
    }

    #[test]
    fn persist_then_load_round_trips_samples() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = AudioVault::new(tmp.path()).unwrap();

        let original = clip(vec![0, 100, -100, i16::MAX, i16::MIN]);
        let filename = vault.persist(&original).unwrap();

        assert!(vault.path(&filename).exists());

        let loaded = vault.load(&filename).unwrap();
        assert_eq!(loaded.samples, original.samples);
        assert_eq!(loaded.sample_rate, 16000);
        assert_eq!(loaded.channels, 1);
    }

    #[test]
    fn persist_never_reuses_filenames() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = AudioVault::new(tmp.path()).unwrap();

        let c = clip(vec![1, 2, 3]);
        let a = vault.persist(&c).unwrap();
        let b = vault.persist(&c).unwrap();

        assert_ne!(a, b);
        assert!(vault.path(&a).exists());
        assert!(vault.path(&b).exists());
    }

    #[test]
    fn read_bytes_returns_the_wav_file() {
        let tmp = tempfile::tempdir().unwrap();
        let vault = AudioVault::new(tmp.path()).unwrap();

        let filename = vault.persist(&clip(vec![5; 160])).unwrap();
        let bytes = vault.read_bytes(&filename).unwrap();

        // WAV header magic
        assert_eq!(&bytes[..4], b"RIFF");
        assert_eq!(bytes, fs::read(vault.path(&filename)).unwrap());
    }
}
