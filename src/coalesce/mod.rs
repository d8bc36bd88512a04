use crate::config::EndPolicy;
use crate::event::{parse_timestamp, Event, ValidationError};
use crate::store::{IntervalRecord, IntervalStore, StoreError};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Notify;

#[derive(Debug, Error)]
pub enum CoalesceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Folds incoming events into the active batch
pub struct Coalescer {
    store: Arc<IntervalStore>,
    policy: EndPolicy,
    rotate_trigger: Option<(usize, Arc<Notify>)>,
}

impl Coalescer {
    pub fn new(store: Arc<IntervalStore>, policy: EndPolicy) -> Self {
        Self {
            store,
            policy,
            rotate_trigger: None,
        }
    }

    /// Wake `notify` whenever the active batch reaches `max_records`
    pub fn with_rotate_trigger(mut self, max_records: usize, notify: Arc<Notify>) -> Self {
        self.rotate_trigger = Some((max_records, notify));
        self
    }

    /// Validate raw request fields, then apply the event.
    /// Nothing is read or written when validation fails.
    pub async fn submit(
        &self,
        name: Option<String>,
        camera_id: Option<String>,
        timestamp: Option<String>,
    ) -> Result<IntervalRecord, CoalesceError> {
        let event = Event::new(name, camera_id, timestamp)?;
        Ok(self.apply(&event).await?)
    }

    /// Merge one event into the active batch and persist it
    pub async fn apply(&self, event: &Event) -> Result<IntervalRecord, StoreError> {
        let mut batch = self.store.lock().await;
        let mut records = batch.load().await?;
        let record = merge(&mut records, event, self.policy);
        batch.save(&records).await?;
        drop(batch);

        tracing::debug!(
            label = %event.label,
            source_id = %event.source_id,
            records = records.len(),
            "Applied event"
        );

        if let Some((max_records, notify)) = &self.rotate_trigger {
            if records.len() >= *max_records {
                tracing::info!(records = records.len(), "Batch size limit reached, requesting rotation");
                notify.notify_one();
            }
        }

        Ok(record)
    }
}

/// Apply `event` to `records` in memory and return the affected record.
///
/// The first record with the same `(label, source_id)` has its end moved
/// according to `policy`; otherwise a zero-length interval is appended.
/// There is no session timeout: any gap between events extends the same record.
pub fn merge(records: &mut Vec<IntervalRecord>, event: &Event, policy: EndPolicy) -> IntervalRecord {
    let existing = records
        .iter_mut()
        .find(|r| r.matches(&event.label, &event.source_id));

    match existing {
        Some(record) => {
            match policy {
                EndPolicy::LastWrite => record.interval_end = event.occurred_at.clone(),
                EndPolicy::Latest => widen(record, event),
            }
            record.clone()
        }
        None => {
            let record =
                IntervalRecord::opened_at(&event.label, &event.source_id, &event.occurred_at);
            records.push(record.clone());
            record
        }
    }
}

/// Grow the interval to cover `event`. Bounds that no longer parse are
/// replaced outright.
fn widen(record: &mut IntervalRecord, event: &Event) {
    let at = event.occurred_at_utc;

    match parse_timestamp(&record.interval_end) {
        Ok(end) if end >= at => {}
        _ => record.interval_end = event.occurred_at.clone(),
    }
    match parse_timestamp(&record.interval_start) {
        Ok(start) if start <= at => {}
        _ => record.interval_start = event.occurred_at.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn event(label: &str, source: &str, at: &str) -> Event {
        Event::new(
            Some(label.to_string()),
            Some(source.to_string()),
            Some(at.to_string()),
        )
        .unwrap()
    }

    #[test]
    fn test_same_pair_extends_one_record() {
        let mut records = Vec::new();
        merge(&mut records, &event("A", "1", "2024-01-01T00:00:00Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("A", "1", "2024-01-01T00:01:00Z"), EndPolicy::LastWrite);
        let last = merge(&mut records, &event("A", "1", "2024-01-01T09:00:00Z"), EndPolicy::LastWrite);

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].interval_start, "2024-01-01T00:00:00Z");
        assert_eq!(records[0].interval_end, "2024-01-01T09:00:00Z");
        assert_eq!(last, records[0]);
    }

    #[test]
    fn test_distinct_pairs_append() {
        let mut records = Vec::new();
        merge(&mut records, &event("A", "1", "2024-01-01T00:00:00Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("A", "2", "2024-01-01T00:00:01Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("B", "1", "2024-01-01T00:00:02Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("A", "1", "2024-01-01T00:00:03Z"), EndPolicy::LastWrite);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].interval_end, "2024-01-01T00:00:03Z");
        assert_eq!(records[1].interval_start, records[1].interval_end);
    }

    #[test]
    fn test_last_write_accepts_earlier_timestamp() {
        let mut records = Vec::new();
        merge(&mut records, &event("A", "1", "2024-01-01T00:00:00Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("A", "1", "2024-01-01T00:10:00Z"), EndPolicy::LastWrite);
        merge(&mut records, &event("A", "1", "2024-01-01T00:05:00Z"), EndPolicy::LastWrite);

        assert_eq!(records[0].interval_start, "2024-01-01T00:00:00Z");
        assert_eq!(records[0].interval_end, "2024-01-01T00:05:00Z");
    }

    #[test]
    fn test_latest_keeps_maximum_end() {
        let mut records = Vec::new();
        merge(&mut records, &event("A", "1", "2024-01-01T00:00:00Z"), EndPolicy::Latest);
        merge(&mut records, &event("A", "1", "2024-01-01T00:10:00Z"), EndPolicy::Latest);
        merge(&mut records, &event("A", "1", "2024-01-01T00:05:00Z"), EndPolicy::Latest);

        assert_eq!(records[0].interval_end, "2024-01-01T00:10:00Z");
    }

    #[test]
    fn test_latest_moves_start_back() {
        let mut records = Vec::new();
        merge(&mut records, &event("A", "1", "2024-01-01T00:10:00Z"), EndPolicy::Latest);
        merge(&mut records, &event("A", "1", "2024-01-01T00:02:00Z"), EndPolicy::Latest);

        assert_eq!(records[0].interval_start, "2024-01-01T00:02:00Z");
        assert_eq!(records[0].interval_end, "2024-01-01T00:10:00Z");
    }

    #[test]
    fn test_first_match_wins_with_duplicates() {
        let mut records = vec![
            IntervalRecord::opened_at("A", "1", "2024-01-01T00:00:00Z"),
            IntervalRecord::opened_at("A", "1", "2024-01-01T00:00:30Z"),
        ];
        merge(&mut records, &event("A", "1", "2024-01-01T00:01:00Z"), EndPolicy::LastWrite);

        assert_eq!(records[0].interval_end, "2024-01-01T00:01:00Z");
        assert_eq!(records[1].interval_end, "2024-01-01T00:00:30Z");
    }

    #[tokio::test]
    async fn test_apply_persists() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let coalescer = Coalescer::new(store.clone(), EndPolicy::LastWrite);

        coalescer.apply(&event("A", "1", "2024-01-01T00:00:00Z")).await.unwrap();
        coalescer.apply(&event("A", "1", "2024-01-01T00:05:00Z")).await.unwrap();

        let records = store.load().await.unwrap();
        assert_eq!(
            records,
            vec![IntervalRecord {
                label: "A".to_string(),
                source_id: "1".to_string(),
                interval_start: "2024-01-01T00:00:00Z".to_string(),
                interval_end: "2024-01-01T00:05:00Z".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_submit_rejects_without_touching_store() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let coalescer = Coalescer::new(store.clone(), EndPolicy::LastWrite);

        let err = coalescer
            .submit(Some("A".to_string()), None, Some("2024-01-01T00:00:00Z".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, CoalesceError::Validation(_)));
        assert!(!store.active_path().exists());
    }

    #[tokio::test]
    async fn test_concurrent_applies_lose_nothing() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let coalescer = Arc::new(Coalescer::new(store.clone(), EndPolicy::LastWrite));

        let mut handles = Vec::new();
        for cam in 0..20 {
            let coalescer = coalescer.clone();
            handles.push(tokio::spawn(async move {
                coalescer
                    .apply(&event("A", &cam.to_string(), "2024-01-01T00:00:00Z"))
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().len(), 20);
    }

    #[tokio::test]
    async fn test_rotate_trigger_fires_at_limit() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(IntervalStore::new(dir.path().join("logs.json")));
        let notify = Arc::new(Notify::new());
        let coalescer = Coalescer::new(store, EndPolicy::LastWrite)
            .with_rotate_trigger(2, notify.clone());

        coalescer.apply(&event("A", "1", "2024-01-01T00:00:00Z")).await.unwrap();
        coalescer.apply(&event("B", "1", "2024-01-01T00:00:01Z")).await.unwrap();

        // notify_one stores a permit, so this returns immediately
        tokio::time::timeout(std::time::Duration::from_secs(1), notify.notified())
            .await
            .unwrap();
    }
}
