use crate::cli::run::open;
use crate::config::load_or_default;
use crate::rotate::Rotator;
use crate::store::StoreError;
use crate::upload::ContentId;
use std::path::PathBuf;
use tracing::{error, info};

/// What a flush did with each closed batch it found
#[derive(Debug, Default)]
pub struct FlushReport {
    pub uploaded: Vec<(PathBuf, ContentId)>,
    /// Still on disk, waiting for the next flush
    pub failed: Vec<PathBuf>,
}

/// Upload every closed batch left behind by failed uploads.
///
/// With `include_active` the active batch is closed first. Only do that while
/// the server is stopped: the store lock does not reach across processes.
pub async fn flush(
    config_path: Option<PathBuf>,
    include_active: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_or_default(config_path.as_deref())?;
    let (_store, rotator) = open(&config).await?;

    let report = flush_pending(&rotator, include_active).await?;
    if report.uploaded.is_empty() && report.failed.is_empty() {
        println!("No closed batches waiting in {}", rotator.closed_dir().display());
        return Ok(());
    }

    for (path, content_id) in &report.uploaded {
        println!("{} -> {}", path.display(), content_id);
    }

    if !report.failed.is_empty() {
        let total = report.failed.len() + report.uploaded.len();
        return Err(format!("{} of {} batches failed to upload", report.failed.len(), total).into());
    }
    Ok(())
}

pub async fn flush_pending(
    rotator: &Rotator,
    include_active: bool,
) -> Result<FlushReport, StoreError> {
    if include_active {
        match rotator.close_active().await? {
            Some(path) => info!(path = %path.display(), "Closed active batch"),
            None => info!("Active batch is empty"),
        }
    }

    let mut report = FlushReport::default();
    for path in rotator.pending().await? {
        match rotator.ship(&path).await {
            Ok(content_id) => report.uploaded.push((path, content_id)),
            Err(e) => {
                error!(error = %e, "Batch still not uploaded");
                report.failed.push(path);
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IntervalRecord, IntervalStore};
    use crate::upload::{UploadError, Uploader};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Rejects any file whose name contains `reject`
    struct PickyUploader {
        reject: &'static str,
    }

    #[async_trait]
    impl Uploader for PickyUploader {
        async fn upload(&self, path: &Path) -> Result<ContentId, UploadError> {
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            if name.contains(self.reject) {
                return Err(UploadError::Rejected {
                    status: 502,
                    body: "bad gateway".to_string(),
                });
            }
            Ok(format!("Qm{}", name.len()))
        }
    }

    fn rotator(dir: &TempDir, reject: &'static str) -> (Arc<IntervalStore>, Rotator) {
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let rotator = Rotator::new(
            store.clone(),
            dir.path().join("old_logs"),
            Arc::new(PickyUploader { reject }),
        );
        (store, rotator)
    }

    fn leave_pending(rotator: &Rotator, name: &str) -> PathBuf {
        std::fs::create_dir_all(rotator.closed_dir()).unwrap();
        let path = rotator.closed_dir().join(name);
        std::fs::write(&path, "[]").unwrap();
        path
    }

    #[tokio::test]
    async fn test_failed_batches_are_counted_and_kept() {
        let dir = TempDir::new().unwrap();
        let (_store, rotator) = rotator(&dir, "bad");
        let good = leave_pending(&rotator, "a_good.json");
        let bad = leave_pending(&rotator, "b_bad.json");

        let report = flush_pending(&rotator, false).await.unwrap();

        assert_eq!(report.uploaded.len(), 1);
        assert_eq!(report.uploaded[0].0, good);
        assert_eq!(report.failed, vec![bad.clone()]);
        assert!(!good.exists());
        assert!(bad.exists());
        assert_eq!(rotator.pending().await.unwrap(), vec![bad]);
    }

    #[tokio::test]
    async fn test_include_active_closes_and_ships_current_batch() {
        let dir = TempDir::new().unwrap();
        let (store, rotator) = rotator(&dir, "never");
        let record = IntervalRecord::opened_at("A", "1", "2024-01-01T00:00:00Z");
        store.lock().await.save(&[record]).await.unwrap();

        let report = flush_pending(&rotator, true).await.unwrap();

        assert_eq!(report.uploaded.len(), 1);
        assert!(report.failed.is_empty());
        assert!(!store.active_path().exists());
        assert!(rotator.pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_nothing_pending() {
        let dir = TempDir::new().unwrap();
        let (_store, rotator) = rotator(&dir, "never");

        let report = flush_pending(&rotator, false).await.unwrap();

        assert!(report.uploaded.is_empty());
        assert!(report.failed.is_empty());
    }
}
