//! Date/time utilities for sharebox.
//!
//! Timestamps are persisted as UTC epoch milliseconds so that range queries
//! in SQL compare integers rather than formatted strings.

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};

/// Convert a UTC datetime to epoch milliseconds.
pub fn to_millis(dt: &DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Convert epoch milliseconds back to a UTC datetime.
///
/// Out-of-range values clamp to the Unix epoch.
pub fn from_millis(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .unwrap_or_default()
}

/// Format a UTC datetime as RFC3339 with second precision (e.g. "2024-01-15T10:30:00Z").
pub fn to_rfc3339(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Format a remaining duration for display, e.g. "1d 2h 5m".
///
/// Negative durations render as "0m".
pub fn format_remaining(remaining: Duration) -> String {
    let total_minutes = remaining.num_minutes().max(0);
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes / 60) % 24;
    let minutes = total_minutes % 60;

    let mut parts = Vec::new();
    if days > 0 {
        parts.push(format!("{days}d"));
    }
    if hours > 0 {
        parts.push(format!("{hours}h"));
    }
    if minutes > 0 || parts.is_empty() {
        parts.push(format!("{minutes}m"));
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap();
        let ms = to_millis(&dt);
        assert_eq!(ms, 1_705_314_600_000);
        assert_eq!(from_millis(ms), dt);
    }

    #[test]
    fn test_to_rfc3339() {
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        assert_eq!(to_rfc3339(&dt), "2024-12-31T23:59:59Z");
    }

    #[test]
    fn test_format_remaining() {
        assert_eq!(format_remaining(Duration::minutes(5)), "5m");
        assert_eq!(format_remaining(Duration::hours(2)), "2h");
        assert_eq!(
            format_remaining(Duration::days(1) + Duration::hours(2) + Duration::minutes(5)),
            "1d 2h 5m"
        );
        assert_eq!(format_remaining(Duration::seconds(30)), "0m");
        assert_eq!(format_remaining(Duration::minutes(-10)), "0m");
    }
}
