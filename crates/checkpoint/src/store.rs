//! Checkpoint storage backends.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ferrocode_core::CheckpointError;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::record::CheckpointRecord;

/// Where checkpoints live. Only the latest checkpoint is kept; its header
/// carries the cycle counter, so there is no other metadata.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    fn name(&self) -> &str;

    /// Persist `summary` as the next cycle (previous cycle + 1, or 1).
    async fn save(&self, summary: &str) -> Result<CheckpointRecord, CheckpointError>;

    async fn read(&self) -> Result<Option<CheckpointRecord>, CheckpointError>;

    async fn has_existing(&self) -> Result<bool, CheckpointError>;

    async fn clear(&self) -> Result<(), CheckpointError>;
}

/// A single Markdown file, replaced atomically on every save.
pub struct FileCheckpointStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_raw(&self) -> Result<Option<String>, CheckpointError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage("read checkpoint", &self.path, e)),
        }
    }

    /// Cycle of the stored checkpoint; an unreadable header counts as 0 so a
    /// damaged file is overwritten rather than blocking progress.
    async fn current_cycle(&self) -> Result<u32, CheckpointError> {
        let Some(text) = self.read_raw().await? else {
            return Ok(0);
        };
        match CheckpointRecord::parse(&text) {
            Ok(record) => Ok(record.cycle),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Overwriting unreadable checkpoint");
                Ok(0)
            }
        }
    }
}

fn storage(action: &str, path: &Path, e: std::io::Error) -> CheckpointError {
    CheckpointError::Storage(format!("Failed to {action} at {}: {e}", path.display()))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn save(&self, summary: &str) -> Result<CheckpointRecord, CheckpointError> {
        let _guard = self.write_lock.lock().await;
        let record = CheckpointRecord::new(self.current_cycle().await? + 1, summary);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage("create checkpoint directory", parent, e))?;
        }

        // Write beside the target and rename over it, so readers see either
        // the old file or the new one, never a partial header.
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "checkpoint".into());
        let tmp = self
            .path
            .with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, record.render())
            .await
            .map_err(|e| storage("write checkpoint", &tmp, e))?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(storage("replace checkpoint", &self.path, e));
        }

        debug!(path = %self.path.display(), cycle = record.cycle, "Checkpoint saved");
        Ok(record)
    }

    async fn read(&self) -> Result<Option<CheckpointRecord>, CheckpointError> {
        match self.read_raw().await? {
            Some(text) => CheckpointRecord::parse(&text).map(Some),
            None => Ok(None),
        }
    }

    async fn has_existing(&self) -> Result<bool, CheckpointError> {
        tokio::fs::try_exists(&self.path)
            .await
            .map_err(|e| storage("check checkpoint", &self.path, e))
    }

    async fn clear(&self) -> Result<(), CheckpointError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Checkpoint cleared");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage("remove checkpoint", &self.path, e)),
        }
    }
}

/// Keeps the rendered checkpoint in memory. Useful for tests and for
/// sessions that should not touch disk.
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    content: RwLock<Option<String>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `record`, as if left by an earlier session.
    pub fn with_record(record: &CheckpointRecord) -> Self {
        Self {
            content: RwLock::new(Some(record.render())),
        }
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn save(&self, summary: &str) -> Result<CheckpointRecord, CheckpointError> {
        let mut content = self.content.write().await;
        let previous = content
            .as_deref()
            .and_then(|text| CheckpointRecord::parse(text).ok())
            .map_or(0, |r| r.cycle);
        let record = CheckpointRecord::new(previous + 1, summary);
        *content = Some(record.render());
        Ok(record)
    }

    async fn read(&self) -> Result<Option<CheckpointRecord>, CheckpointError> {
        self.content
            .read()
            .await
            .as_deref()
            .map(CheckpointRecord::parse)
            .transpose()
    }

    async fn has_existing(&self) -> Result<bool, CheckpointError> {
        Ok(self.content.read().await.is_some())
    }

    async fn clear(&self) -> Result<(), CheckpointError> {
        *self.content.write().await = None;
        Ok(())
    }
}
