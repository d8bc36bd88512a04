use super::{RotateError, RotateOutcome, Rotator};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Rotate on every `interval` tick, or early when `wake` is notified, until
/// `shutdown_rx` flips to true. A rotation already under way always finishes.
pub async fn run_rotation_task(
    rotator: Arc<Rotator>,
    interval: Duration,
    wake: Arc<Notify>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = wake.notified() => {
                ticker.reset();
            }
            _ = shutdown_rx.wait_for(|&stop| stop) => {
                info!("Rotation task shutting down");
                break;
            }
        }

        log_outcome(rotator.rotate().await);
    }
}

pub(crate) fn log_outcome(result: Result<RotateOutcome, RotateError>) {
    match result {
        Ok(RotateOutcome::Empty) => debug!("No logs to upload"),
        Ok(RotateOutcome::Uploaded {
            file_name,
            content_id,
        }) => info!(file = %file_name, content_id = %content_id, "Batch uploaded"),
        Err(RotateError::Upload { path, source }) => error!(
            path = %path.display(),
            error = %source,
            "Failed to upload batch, keeping it on disk"
        ),
        Err(RotateError::Store(e)) => error!(error = %e, "Rotation failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{IntervalRecord, IntervalStore};
    use crate::upload::{ContentId, UploadError, Uploader};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Default)]
    struct CountingUploader {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Uploader for CountingUploader {
        async fn upload(&self, _path: &Path) -> Result<ContentId, UploadError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("Qm{n}"))
        }
    }

    async fn seed(store: &IntervalStore) {
        let record = IntervalRecord::opened_at("A", "1", "2024-01-01T00:00:00Z");
        store.lock().await.save(&[record]).await.unwrap();
    }

    #[tokio::test]
    async fn test_wake_triggers_rotation() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let uploader = Arc::new(CountingUploader::default());
        let rotator = Arc::new(Rotator::new(
            store.clone(),
            dir.path().join("old_logs"),
            uploader.clone(),
        ));
        let wake = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        seed(&store).await;
        let handle = tokio::spawn(run_rotation_task(
            rotator,
            Duration::from_secs(3600),
            wake.clone(),
            shutdown_rx,
        ));

        wake.notify_one();
        for _ in 0..100 {
            if uploader.calls.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 1);
        assert!(!store.active_path().exists());

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_interval_rotates_repeatedly() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let uploader = Arc::new(CountingUploader::default());
        let rotator = Arc::new(Rotator::new(
            store.clone(),
            dir.path().join("old_logs"),
            uploader.clone(),
        ));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run_rotation_task(
            rotator,
            Duration::from_millis(20),
            Arc::new(Notify::new()),
            shutdown_rx,
        ));

        seed(&store).await;
        for _ in 0..100 {
            if uploader.calls.load(Ordering::SeqCst) >= 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        seed(&store).await;
        for _ in 0..100 {
            if uploader.calls.load(Ordering::SeqCst) >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(uploader.calls.load(Ordering::SeqCst), 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
