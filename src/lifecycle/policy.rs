//! Lifecycle policy: pure functions over a record and an injected "now".

use chrono::{DateTime, Duration, Utc};

use super::{MAX_EXPIRY_HOURS, MIN_EXPIRY_HOURS};
use crate::error::GoneReason;
use crate::file::FileRecord;
use crate::{Result, ShareError};

/// Check an expiry horizon is within the allowed range.
pub fn validate_expiry_hours(expiry_hours: i64) -> Result<()> {
    if (MIN_EXPIRY_HOURS..=MAX_EXPIRY_HOURS).contains(&expiry_hours) {
        Ok(())
    } else {
        Err(ShareError::InvalidExpiry(expiry_hours))
    }
}

/// Expiry timestamp for a file created at `created_at`.
pub fn compute_expiry(created_at: DateTime<Utc>, expiry_hours: i64) -> Result<DateTime<Utc>> {
    validate_expiry_hours(expiry_hours)?;
    Ok(created_at + Duration::hours(expiry_hours))
}

/// Whether the record is past its expiry at `now`.
pub fn is_expired(record: &FileRecord, now: DateTime<Utc>) -> bool {
    now > record.expires_at
}

/// Whether the record has used up its downloads.
pub fn is_download_limit_reached(record: &FileRecord) -> bool {
    record.download_count >= record.max_downloads
}

/// Time left until expiry, never negative.
pub fn time_remaining(record: &FileRecord, now: DateTime<Utc>) -> Duration {
    (record.expires_at - now).max(Duration::zero())
}

/// Gate a record for serving. Expiry is reported before the download limit.
pub fn check_available(record: &FileRecord, now: DateTime<Utc>) -> Result<()> {
    if is_expired(record, now) {
        return Err(ShareError::Gone(GoneReason::Expired));
    }
    if is_download_limit_reached(record) {
        return Err(ShareError::Gone(GoneReason::DownloadLimitReached));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn record(expires_at: DateTime<Utc>, download_count: i64, max_downloads: i64) -> FileRecord {
        FileRecord {
            id: Uuid::new_v4(),
            original_name: "a.txt".to_string(),
            stored_name: "ab.txt".to_string(),
            storage_path: "ab/ab.txt".to_string(),
            content_type: "text/plain".to_string(),
            size: 1,
            created_at: expires_at - Duration::hours(24),
            expires_at,
            download_count,
            max_downloads,
            is_expired: false,
            owner_id: None,
            access_log: vec![],
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_compute_expiry_range() {
        for hours in [1, 24, 100, 168] {
            let expiry = compute_expiry(t0(), hours).unwrap();
            assert_eq!(expiry - t0(), Duration::hours(hours));
        }
    }

    #[test]
    fn test_compute_expiry_rejects_out_of_range() {
        assert!(matches!(
            compute_expiry(t0(), 0),
            Err(ShareError::InvalidExpiry(0))
        ));
        assert!(matches!(
            compute_expiry(t0(), 169),
            Err(ShareError::InvalidExpiry(169))
        ));
        assert!(compute_expiry(t0(), -5).is_err());
    }

    #[test]
    fn test_is_expired_boundary() {
        let r = record(t0(), 0, 10);
        assert!(!is_expired(&r, t0() - Duration::seconds(1)));
        assert!(!is_expired(&r, t0()));
        assert!(is_expired(&r, t0() + Duration::milliseconds(1)));
    }

    #[test]
    fn test_is_expired_monotonic() {
        let r = record(t0(), 0, 10);
        let mut seen_expired = false;
        for minutes in -120..120 {
            let expired = is_expired(&r, t0() + Duration::minutes(minutes));
            assert!(!(seen_expired && !expired));
            seen_expired |= expired;
        }
        assert!(seen_expired);
    }

    #[test]
    fn test_download_limit() {
        assert!(!is_download_limit_reached(&record(t0(), 1, 2)));
        assert!(is_download_limit_reached(&record(t0(), 2, 2)));
        assert!(is_download_limit_reached(&record(t0(), 3, 2)));
    }

    #[test]
    fn test_time_remaining_clamped() {
        let r = record(t0(), 0, 10);
        assert_eq!(time_remaining(&r, t0() - Duration::hours(3)), Duration::hours(3));
        assert_eq!(time_remaining(&r, t0() + Duration::hours(3)), Duration::zero());
    }

    #[test]
    fn test_check_available_prefers_expired() {
        let r = record(t0(), 5, 5);
        assert!(matches!(
            check_available(&r, t0() + Duration::hours(1)),
            Err(ShareError::Gone(GoneReason::Expired))
        ));
        assert!(matches!(
            check_available(&r, t0()),
            Err(ShareError::Gone(GoneReason::DownloadLimitReached))
        ));
        assert!(check_available(&record(t0(), 0, 5), t0()).is_ok());
    }
}
