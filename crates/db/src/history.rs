//! JSON-file backed run history.
//!
//! Records are held in memory newest-first and the whole list is rewritten
//! on every change. Writes go to a sibling temp file which is then renamed
//! over the target, so a crash never leaves a half-written history.

use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use vlabs_core::types::RunId;

use crate::models::RunRecord;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("History serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Bounded, persisted list of past runs.
pub struct HistoryStore {
    path: PathBuf,
    max_entries: usize,
    records: Mutex<Vec<RunRecord>>,
}

impl HistoryStore {
    /// Load the history file at `path`.
    ///
    /// A missing file yields an empty history. An unreadable or corrupt file
    /// is logged and treated as empty; it is replaced on the next write.
    pub async fn open(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        let path = path.into();
        let mut records = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Vec<RunRecord>>(&bytes) {
                Ok(records) => records,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Corrupt history file, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Unreadable history file, starting empty");
                Vec::new()
            }
        };
        records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        records.truncate(max_entries);

        tracing::info!(path = %path.display(), count = records.len(), "Loaded run history");
        Self {
            path,
            max_entries,
            records: Mutex::new(records),
        }
    }

    /// Insert `record` at the front, replacing any entry with the same run id,
    /// and persist.
    ///
    /// The in-memory list only changes once the file has been written.
    pub async fn record(&self, record: RunRecord) -> Result<(), HistoryError> {
        let mut records = self.records.lock().await;
        let run_id = record.run_id;
        let mut updated = Vec::with_capacity(records.len() + 1);
        updated.push(record);
        updated.extend(records.iter().filter(|r| r.run_id != run_id).cloned());
        updated.truncate(self.max_entries);
        self.persist(&updated).await?;
        *records = updated;
        Ok(())
    }

    /// Up to `limit` records, newest first.
    pub async fn list(&self, limit: Option<usize>) -> Vec<RunRecord> {
        let records = self.records.lock().await;
        let limit = limit.unwrap_or(records.len());
        records.iter().take(limit).cloned().collect()
    }

    pub async fn get(&self, run_id: RunId) -> Option<RunRecord> {
        let records = self.records.lock().await;
        records.iter().find(|r| r.run_id == run_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Remove every record. Returns how many were removed.
    pub async fn clear(&self) -> Result<usize, HistoryError> {
        let mut records = self.records.lock().await;
        self.persist(&[]).await?;
        let removed = records.len();
        records.clear();
        Ok(removed)
    }

    async fn persist(&self, records: &[RunRecord]) -> Result<(), HistoryError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| HistoryError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(io_err(parent))?;
        }

        let json = serde_json::to_vec_pretty(records)?;
        let tmp_path = temp_path(&self.path);
        fs::write(&tmp_path, json).await.map_err(io_err(&tmp_path))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err(&self.path))?;

        tracing::debug!(path = %self.path.display(), count = records.len(), "Persisted run history");
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}
