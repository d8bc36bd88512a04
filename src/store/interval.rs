use serde::{Deserialize, Serialize};

/// One coalesced run of sightings of `label` on `source_id`.
///
/// Field names on disk follow the format downstream consumers already read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    #[serde(rename = "name")]
    pub label: String,

    #[serde(rename = "camera_id")]
    pub source_id: String,

    #[serde(rename = "timestamp_start")]
    pub interval_start: String,

    #[serde(rename = "timestamp_end")]
    pub interval_end: String,
}

impl IntervalRecord {
    /// A zero-length interval at `at`
    pub fn opened_at(label: &str, source_id: &str, at: &str) -> Self {
        Self {
            label: label.to_string(),
            source_id: source_id.to_string(),
            interval_start: at.to_string(),
            interval_end: at.to_string(),
        }
    }

    pub fn matches(&self, label: &str, source_id: &str) -> bool {
        self.label == label && self.source_id == source_id
    }
}

/// Characters in the timestamp format that are not safe in file names
const UNSAFE_CHARS: [char; 2] = [':', 'T'];

fn sanitize_timestamp(ts: &str) -> String {
    ts.replace(UNSAFE_CHARS, "-")
}

/// Name of the closed-batch file for `records`, taken from the first record's
/// start and the last record's end. `None` for an empty batch.
pub fn closed_batch_name(records: &[IntervalRecord]) -> Option<String> {
    let first = records.first()?;
    let last = records.last()?;
    Some(format!(
        "{}_{}.json",
        sanitize_timestamp(&first.interval_start),
        sanitize_timestamp(&last.interval_end)
    ))
}
