//! The active batch: one JSON file holding the interval records accumulated
//! since the last rotation.
//!
//! Every read-modify-write of the active file goes through [`IntervalStore::lock`].
//! Holding the returned [`ActiveBatch`] excludes ingestion and the rotator's
//! detach step from each other, so neither can resurrect or drop the other's
//! write.

pub mod interval;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

pub use interval::{closed_batch_name, IntervalRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("batch file '{}' is corrupt: {source}", path.display())]
    CorruptState {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize batch: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read a batch file. An absent file is an empty batch.
pub async fn read_batch_file(path: &Path) -> Result<Vec<IntervalRecord>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_slice(&bytes).map_err(|source| StoreError::CorruptState {
        path: path.to_path_buf(),
        source,
    })
}

/// Handle on the active batch file
#[derive(Debug)]
pub struct IntervalStore {
    active_path: PathBuf,
    lock: Mutex<()>,
}

impl IntervalStore {
    pub fn new(active_path: impl Into<PathBuf>) -> Self {
        Self {
            active_path: active_path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn active_path(&self) -> &Path {
        &self.active_path
    }

    /// Create the directory holding the active file if it is missing
    pub async fn prepare(&self) -> Result<()> {
        match self.active_path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e)),
            _ => Ok(()),
        }
    }

    /// Take exclusive ownership of the active slot
    pub async fn lock(&self) -> ActiveBatch<'_> {
        ActiveBatch {
            path: &self.active_path,
            _guard: self.lock.lock().await,
        }
    }

    /// Snapshot of the active batch
    pub async fn load(&self) -> Result<Vec<IntervalRecord>> {
        self.lock().await.load().await
    }
}

/// Exclusive access to the active slot, released on drop
pub struct ActiveBatch<'a> {
    path: &'a Path,
    _guard: MutexGuard<'a, ()>,
}

impl ActiveBatch<'_> {
    pub async fn load(&self) -> Result<Vec<IntervalRecord>> {
        read_batch_file(self.path).await
    }

    /// Replace the active batch with `records`.
    ///
    /// Writes a sibling temp file and renames it over the active file, so the
    /// active path always holds a complete batch.
    pub async fn save(&mut self, records: &[IntervalRecord]) -> Result<()> {
        let json = serde_json::to_vec_pretty(records)?;
        let tmp_path = temp_path(self.path);

        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;
        tokio::fs::rename(&tmp_path, self.path)
            .await
            .map_err(|e| StoreError::io(self.path, e))?;

        tracing::debug!(path = %self.path.display(), records = records.len(), "Saved active batch");
        Ok(())
    }

    /// Move the active file to `dest`, leaving the active slot empty.
    pub async fn detach(&mut self, dest: &Path) -> Result<()> {
        tokio::fs::rename(self.path, dest)
            .await
            .map_err(|e| StoreError::io(self.path, e))
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
