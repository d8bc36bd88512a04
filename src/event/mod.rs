pub mod timestamp;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use timestamp::{parse_timestamp, TimestampError};

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing log fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(#[from] TimestampError),
}

/// One sighting reported by a camera. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// Who or what was seen (`name` on the wire)
    pub label: String,
    /// The reporting camera (`camera_id` on the wire)
    pub source_id: String,
    /// ISO-8601 timestamp as reported, minus surrounding whitespace
    pub occurred_at: String,
    /// `occurred_at` parsed, for ordering comparisons
    pub occurred_at_utc: DateTime<Utc>,
}

impl Event {
    /// Build an event, rejecting missing fields and unparsable timestamps.
    ///
    /// Empty strings count as missing. The timestamp is trimmed first.
    pub fn new(
        label: Option<String>,
        source_id: Option<String>,
        occurred_at: Option<String>,
    ) -> Result<Self, ValidationError> {
        // Surrounding whitespace would otherwise reach the batch file and its name
        let occurred_at = occurred_at.map(|s| s.trim().to_string());
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());

        let mut missing = Vec::new();
        if !present(&label) {
            missing.push("name");
        }
        if !present(&source_id) {
            missing.push("camera_id");
        }
        if !present(&occurred_at) {
            missing.push("timestamp");
        }

        match (label, source_id, occurred_at) {
            (Some(label), Some(source_id), Some(occurred_at)) if missing.is_empty() => {
                let occurred_at_utc = parse_timestamp(&occurred_at)?;
                Ok(Self {
                    label,
                    source_id,
                    occurred_at,
                    occurred_at_utc,
                })
            }
            _ => Err(ValidationError::MissingFields(missing)),
        }
    }
}
