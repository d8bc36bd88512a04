pub mod runner;

use crate::store::{closed_batch_name, IntervalStore, StoreError};
use crate::upload::{ContentId, UploadError, Uploader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

pub use runner::run_rotation_task;

#[derive(Debug, Error)]
pub enum RotateError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The closed batch stays at `path` until an operator flushes it
    #[error("failed to upload '{}': {source}", path.display())]
    Upload {
        path: PathBuf,
        #[source]
        source: UploadError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RotateOutcome {
    /// Nothing to rotate: the active batch was absent or empty
    Empty,
    /// The batch was closed, uploaded and removed locally
    Uploaded {
        file_name: String,
        content_id: ContentId,
    },
}

/// Closes the active batch and hands it to remote storage
pub struct Rotator {
    store: Arc<IntervalStore>,
    closed_dir: PathBuf,
    uploader: Arc<dyn Uploader>,
}

impl Rotator {
    pub fn new(
        store: Arc<IntervalStore>,
        closed_dir: impl Into<PathBuf>,
        uploader: Arc<dyn Uploader>,
    ) -> Self {
        Self {
            store,
            closed_dir: closed_dir.into(),
            uploader,
        }
    }

    pub fn closed_dir(&self) -> &Path {
        &self.closed_dir
    }

    /// Close the active batch and upload it.
    ///
    /// On upload failure the closed file is left in place and is not merged
    /// back into the active batch.
    pub async fn rotate(&self) -> Result<RotateOutcome, RotateError> {
        let Some(closed) = self.close_active().await? else {
            return Ok(RotateOutcome::Empty);
        };

        let content_id = self.ship(&closed).await?;
        Ok(RotateOutcome::Uploaded {
            file_name: file_name(&closed),
            content_id,
        })
    }

    /// Move the active batch into `closed_dir` under its timestamp-derived
    /// name. Returns `None` without touching disk if the batch is empty.
    ///
    /// Runs under the store lock, so no in-flight event can land in the file
    /// after it has been moved.
    pub async fn close_active(&self) -> Result<Option<PathBuf>, StoreError> {
        let mut batch = self.store.lock().await;
        let records = batch.load().await?;
        let Some(name) = closed_batch_name(&records) else {
            return Ok(None);
        };

        tokio::fs::create_dir_all(&self.closed_dir)
            .await
            .map_err(|source| StoreError::Io {
                path: self.closed_dir.clone(),
                source,
            })?;
        let dest = unused_path(&self.closed_dir, &name).await?;
        batch.detach(&dest).await?;

        tracing::debug!(path = %dest.display(), records = records.len(), "Closed active batch");
        Ok(Some(dest))
    }

    /// Upload a closed batch file and delete it once the remote store has it
    pub async fn ship(&self, path: &Path) -> Result<ContentId, RotateError> {
        let content_id = self
            .uploader
            .upload(path)
            .await
            .map_err(|source| RotateError::Upload {
                path: path.to_path_buf(),
                source,
            })?;

        // The remote copy is authoritative now; a leftover local file would
        // only be uploaded again by a later flush.
        if let Err(e) = tokio::fs::remove_file(path).await {
            tracing::warn!(path = %path.display(), error = %e, "Uploaded batch could not be deleted");
        }

        Ok(content_id)
    }

    /// Closed batch files still waiting in `closed_dir`, oldest name first
    pub async fn pending(&self) -> Result<Vec<PathBuf>, StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.closed_dir.clone(),
            source,
        };

        let mut entries = match tokio::fs::read_dir(&self.closed_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err(e)),
        };

        let mut pending = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
            let path = entry.path();
            let is_file = entry.file_type().await.map_err(io_err)?.is_file();
            if is_file && path.extension().is_some_and(|ext| ext == "json") {
                pending.push(path);
            }
        }
        pending.sort();
        Ok(pending)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `dir/name`, or `dir/<stem>-N.json` if a preserved batch already has that name
async fn unused_path(dir: &Path, name: &str) -> Result<PathBuf, StoreError> {
    let candidate = dir.join(name);
    if !exists(&candidate).await? {
        return Ok(candidate);
    }

    let stem = name.strip_suffix(".json").unwrap_or(name);
    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{stem}-{n}.json"));
        if !exists(&candidate).await? {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// An unreadable path is an error, never "free": renaming over it could
/// destroy a preserved batch.
async fn exists(path: &Path) -> Result<bool, StoreError> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
}
