use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

/// Naive layouts accepted when the value carries no offset. Cameras that
/// report local wall-clock time without a zone are treated as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

#[derive(Debug, Error)]
#[error("failed to parse timestamp '{value}' as ISO-8601")]
pub struct TimestampError {
    pub value: String,
}

/// Parse an ISO-8601 timestamp.
///
/// RFC 3339 values (`2024-01-01T00:00:00Z`, `...+02:00`) are converted to UTC.
/// Values without an offset (`2024-01-01T00:00:00.123456`) are assumed UTC.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TimestampError> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError {
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    #[test]
    fn test_rfc3339_utc() {
        let ts = parse_timestamp("2024-01-01T00:05:00Z").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 5, 0).unwrap());
    }

    #[test]
    fn test_rfc3339_with_offset() {
        let ts = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_naive_with_micros_assumes_utc() {
        let ts = parse_timestamp("2025-03-14T09:26:53.589793").unwrap();
        assert_eq!(ts.year(), 2025);
        assert_eq!(ts.hour(), 9);
        assert_eq!(ts.nanosecond(), 589_793_000);
    }

    #[test]
    fn test_space_separated() {
        let ts = parse_timestamp("2024-06-01 12:30:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_garbage_rejected() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert_eq!(err.value, "yesterday");
        assert!(parse_timestamp("").is_err());
        assert!(parse_timestamp("2024-13-01T00:00:00Z").is_err());
    }
}
