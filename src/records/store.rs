use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::record::UtteranceRecord;

/// Persistent utterance record store.
///
/// `store` is insert-or-replace by id, so resubmission and redelivery flow
/// through the same path as the initial write. Readers (the UI, the picker)
/// may run concurrently with the controller's writes.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn store(&self, record: &UtteranceRecord) -> Result<String>;
    async fn fetch(&self, id: &str) -> Result<Option<UtteranceRecord>>;
    /// All records, newest first.
    async fn all(&self) -> Result<Vec<UtteranceRecord>>;
    /// Retry candidates: queued/interstitial/failed with no paste timestamp.
    async fn queued_or_failed(&self) -> Result<Vec<UtteranceRecord>>;
    async fn delete(&self, id: &str) -> Result<()>;
    async fn delete_all(&self) -> Result<()>;
    /// Remove records older than the given age. Returns how many were removed.
    async fn prune(&self, older_than_hours: i64) -> Result<usize>;
    async fn count(&self) -> Result<usize>;
    /// Case-insensitive substring search over transcript text.
    async fn search(&self, text: &str) -> Result<Vec<UtteranceRecord>>;
    /// The queue picker's only write: stamp a record as delivered.
    async fn mark_delivered(&self, id: &str, when: DateTime<Utc>) -> Result<()>;
}

/// One pretty-printed JSON file per record.
pub struct JsonRecordStore {
    dir: PathBuf,
}

impl JsonRecordStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create record directory: {}", dir.display()))?;

        info!("Record store ready: {}", dir.display());

        Ok(Self { dir })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    fn load_all(&self) -> Result<Vec<UtteranceRecord>> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir).context("Failed to read record directory")? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let data = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read record: {}", path.display()))?;

            match serde_json::from_str::<UtteranceRecord>(&data) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping unreadable record {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn write(&self, record: &UtteranceRecord) -> Result<()> {
        let path = self.record_path(&record.id);
        let data = serde_json::to_string_pretty(record).context("Failed to encode record")?;
        fs::write(&path, data)
            .with_context(|| format!("Failed to write record: {}", path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for JsonRecordStore {
    async fn store(&self, record: &UtteranceRecord) -> Result<String> {
        self.write(record)?;
        info!(
            "Stored record {} (mode={:?}, status={:?})",
            record.id, record.mode, record.status
        );
        Ok(record.id.clone())
    }

    async fn fetch(&self, id: &str) -> Result<Option<UtteranceRecord>> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read record: {}", path.display()))?;
        let record = serde_json::from_str(&data)
            .with_context(|| format!("Failed to decode record: {}", path.display()))?;
        Ok(Some(record))
    }

    async fn all(&self) -> Result<Vec<UtteranceRecord>> {
        self.load_all()
    }

    async fn queued_or_failed(&self) -> Result<Vec<UtteranceRecord>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.is_retry_candidate())
            .collect())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.record_path(id);
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to delete record: {}", path.display()))?;
        }
        Ok(())
    }

    async fn delete_all(&self) -> Result<()> {
        for record in self.load_all()? {
            self.delete(&record.id).await?;
        }
        Ok(())
    }

    async fn prune(&self, older_than_hours: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::hours(older_than_hours);
        let mut removed = 0;

        for record in self.load_all()? {
            if record.created_at < cutoff {
                self.delete(&record.id).await?;
                removed += 1;
            }
        }

        if removed > 0 {
            info!("Pruned {} records older than {}h", removed, older_than_hours);
        }

        Ok(removed)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.load_all()?.len())
    }

    async fn search(&self, text: &str) -> Result<Vec<UtteranceRecord>> {
        let needle = text.to_lowercase();
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|r| r.text.to_lowercase().contains(&needle))
            .collect())
    }

    async fn mark_delivered(&self, id: &str, when: DateTime<Utc>) -> Result<()> {
        let mut record = self
            .fetch(id)
            .await?
            .with_context(|| format!("No record with id {}", id))?;

        record.pasted_at = Some(when);
        self.write(&record)?;

        info!("Marked record {} delivered", id);
        Ok(())
    }
}
