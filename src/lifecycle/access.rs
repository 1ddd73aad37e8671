//! Access recording for successful downloads.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use crate::clock::Clock;
use crate::db::UserStatsStore;
use crate::error::GoneReason;
use crate::file::{FileRecord, MetadataStore, RequesterInfo};
use crate::{Result, ShareError};

/// Counts downloads and keeps the access log.
pub struct AccessRecorder {
    metadata: Arc<dyn MetadataStore>,
    stats: Arc<dyn UserStatsStore>,
    clock: Arc<dyn Clock>,
    log_cap: i64,
}

impl AccessRecorder {
    /// Create a recorder. `log_cap` bounds each file's access log (0 = unbounded).
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        stats: Arc<dyn UserStatsStore>,
        clock: Arc<dyn Clock>,
        log_cap: i64,
    ) -> Self {
        Self {
            metadata,
            stats,
            clock,
            log_cap,
        }
    }

    /// Record one download of `record` by `requester`.
    ///
    /// The counter increment and log append are a single conditional save; if
    /// another request used the last download (or the file expired) in the
    /// meantime the download is refused as gone. A record deleted in the
    /// meantime is `NotFound`. The owner's statistic is updated afterwards and
    /// its failure is only logged.
    pub async fn record(&self, record: &FileRecord, requester: &RequesterInfo) -> Result<FileRecord> {
        let now = self.clock.now();
        let entry = requester.to_entry(now);

        let Some(updated) = self
            .metadata
            .record_download(record.id, &entry, self.log_cap)
            .await?
        else {
            return Err(self.refusal(record, now).await?);
        };

        if let Some(owner_id) = updated.owner_id {
            if let Err(e) = self.stats.record_download(owner_id).await {
                warn!(file_id = %updated.id, owner_id, "Failed to update download stats: {}", e);
            }
        }

        Ok(updated)
    }

    /// Why a conditional download save was refused.
    async fn refusal(&self, record: &FileRecord, now: DateTime<Utc>) -> Result<ShareError> {
        let Some(current) = self.metadata.get(record.id).await? else {
            return Ok(ShareError::NotFound(format!("file {}", record.id)));
        };
        Ok(if super::policy::is_expired(&current, now) {
            ShareError::Gone(GoneReason::Expired)
        } else {
            ShareError::Gone(GoneReason::DownloadLimitReached)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::db::{NewUser, SqliteUserStats, UserRepository};
    use crate::file::{AccessLogEntry, NewFileRecord, SqliteMetadataStore};
    use crate::Database;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    struct Fixture {
        db: Database,
        clock: ManualClock,
        recorder: AccessRecorder,
        metadata: Arc<SqliteMetadataStore>,
    }

    async fn setup() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        let metadata = Arc::new(SqliteMetadataStore::new(db.pool().clone()));
        let recorder = AccessRecorder::new(
            metadata.clone(),
            Arc::new(SqliteUserStats::new(db.pool().clone())),
            Arc::new(clock.clone()),
            0,
        );
        Fixture {
            db,
            clock,
            recorder,
            metadata,
        }
    }

    async fn create(fx: &Fixture, max_downloads: i64, owner_id: Option<i64>) -> FileRecord {
        let now = fx.clock.now();
        fx.metadata
            .create(&NewFileRecord {
                original_name: "a.txt".to_string(),
                stored_name: "ab.txt".to_string(),
                storage_path: "ab/ab.txt".to_string(),
                content_type: "text/plain".to_string(),
                size: 3,
                created_at: now,
                expires_at: now + Duration::hours(1),
                max_downloads,
                owner_id,
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_increments_and_logs() {
        let fx = setup().await;
        let file = create(&fx, 10, None).await;

        let updated = fx
            .recorder
            .record(&file, &RequesterInfo::new("10.0.0.1", "ua"))
            .await
            .unwrap();

        assert_eq!(updated.download_count, 1);
        assert_eq!(updated.access_log.len(), 1);
        assert_eq!(updated.access_log[0].accessed_at, fx.clock.now());
    }

    #[tokio::test]
    async fn test_record_updates_owner_stats() {
        let fx = setup().await;
        let users = UserRepository::new(fx.db.pool());
        let owner = users.create(&NewUser::new("owner")).await.unwrap();
        let file = create(&fx, 10, Some(owner.id)).await;

        fx.recorder
            .record(&file, &RequesterInfo::default())
            .await
            .unwrap();

        let owner = users.get_by_id(owner.id).await.unwrap().unwrap();
        assert_eq!(owner.download_count, 1);
    }

    #[tokio::test]
    async fn test_record_refuses_when_limit_used() {
        let fx = setup().await;
        let file = create(&fx, 1, None).await;
        let requester = RequesterInfo::default();

        fx.recorder.record(&file, &requester).await.unwrap();
        let result = fx.recorder.record(&file, &requester).await;

        assert!(matches!(
            result,
            Err(ShareError::Gone(GoneReason::DownloadLimitReached))
        ));
    }

    #[tokio::test]
    async fn test_record_refuses_after_expiry() {
        let fx = setup().await;
        let file = create(&fx, 10, None).await;
        fx.clock.advance(Duration::hours(2));

        let result = fx.recorder.record(&file, &RequesterInfo::default()).await;
        assert!(matches!(result, Err(ShareError::Gone(GoneReason::Expired))));
    }

    #[tokio::test]
    async fn test_record_deleted_file_is_not_found() {
        let fx = setup().await;
        let file = create(&fx, 10, None).await;
        fx.metadata.delete(file.id).await.unwrap();

        let result = fx.recorder.record(&file, &RequesterInfo::default()).await;
        assert!(matches!(result, Err(ShareError::NotFound(_))));
    }

    /// Deletes the record while a download is being saved.
    struct DeleteDuringSave(Arc<SqliteMetadataStore>);

    #[async_trait]
    impl MetadataStore for DeleteDuringSave {
        async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
            self.0.create(new_file).await
        }
        async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
            self.0.get(id).await
        }
        async fn list_by_owner(&self, owner_id: i64, page: i64, page_size: i64)
            -> Result<Vec<FileRecord>> {
            self.0.list_by_owner(owner_id, page, page_size).await
        }
        async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
            self.0.count_by_owner(owner_id).await
        }
        async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>> {
            self.0.find_expired(now).await
        }
        async fn delete(&self, id: Uuid) -> Result<bool> {
            self.0.delete(id).await
        }
        async fn record_download(
            &self,
            id: Uuid,
            entry: &AccessLogEntry,
            log_cap: i64,
        ) -> Result<Option<FileRecord>> {
            let saved = self.0.record_download(id, entry, log_cap).await;
            self.0.delete(id).await?;
            saved
        }
        async fn list_storage_paths(&self) -> Result<Vec<String>> {
            self.0.list_storage_paths().await
        }
    }

    #[tokio::test]
    async fn test_record_survives_delete_after_save() {
        let fx = setup().await;
        let file = create(&fx, 10, None).await;
        let recorder = AccessRecorder::new(
            Arc::new(DeleteDuringSave(fx.metadata.clone())),
            Arc::new(SqliteUserStats::new(fx.db.pool().clone())),
            Arc::new(fx.clock.clone()),
            0,
        );

        let updated = recorder
            .record(&file, &RequesterInfo::new("10.0.0.1", "ua"))
            .await
            .unwrap();

        assert_eq!(updated.download_count, 1);
        assert_eq!(updated.access_log.len(), 1);
        assert!(fx.metadata.get(file.id).await.unwrap().is_none());
    }
}
