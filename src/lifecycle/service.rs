//! File service for sharebox.
//!
//! This module provides the lifecycle operations exposed to callers:
//! - Upload with validation and expiry computation
//! - Info and download gated on expiry and download limit
//! - Owner-checked deletion
//! - Owner listing and share-link dispatch

use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use validator::ValidateEmail;

use super::access::AccessRecorder;
use super::policy;
use super::{DEFAULT_EXPIRY_HOURS, DEFAULT_MAX_DOWNLOADS};
use crate::clock::Clock;
use crate::config::Config;
use crate::datetime::format_remaining;
use crate::db::{Database, SqliteUserStats, UserStatsStore};
use crate::file::{
    resolve_content_type, BlobStore, FileRecord, MetadataStore, NewFileRecord, RequesterInfo,
    SqliteMetadataStore, MAX_FILENAME_LENGTH,
};
use crate::notify::{LogNotifier, Notifier, ShareNotice};
use crate::{Result, ShareError};

/// Request data for file upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Original filename.
    pub original_name: String,
    /// File content.
    pub content: Vec<u8>,
    /// MIME type; guessed from the name when absent.
    pub content_type: Option<String>,
    /// Expiry horizon in hours; the configured default when absent.
    pub expiry_hours: Option<i64>,
    /// Download limit; the configured default when absent.
    pub max_downloads: Option<i64>,
    /// Uploading user, `None` for anonymous uploads.
    pub owner_id: Option<i64>,
}

impl UploadRequest {
    /// Create a new anonymous upload request with default limits.
    pub fn new(original_name: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            original_name: original_name.into(),
            content,
            content_type: None,
            expiry_hours: None,
            max_downloads: None,
            owner_id: None,
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the expiry horizon.
    pub fn with_expiry_hours(mut self, hours: i64) -> Self {
        self.expiry_hours = Some(hours);
        self
    }

    /// Set the download limit.
    pub fn with_max_downloads(mut self, max_downloads: i64) -> Self {
        self.max_downloads = Some(max_downloads);
        self
    }

    /// Set the owner.
    pub fn with_owner(mut self, owner_id: i64) -> Self {
        self.owner_id = Some(owner_id);
        self
    }
}

/// Result of a file download.
#[derive(Debug)]
pub struct DownloadResult {
    /// Record after the download was counted.
    pub record: FileRecord,
    /// File content.
    pub content: Vec<u8>,
}

/// One page of an owner's files.
#[derive(Debug, Clone)]
pub struct OwnerFiles {
    pub files: Vec<FileRecord>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

/// Tunables for [`FileService`].
#[derive(Debug, Clone)]
pub struct FileServiceOptions {
    pub default_expiry_hours: i64,
    pub default_max_downloads: i64,
    /// Maximum upload size in bytes.
    pub max_upload_size: u64,
    /// Access-log entries kept per file (0 = unbounded).
    pub max_access_log_entries: i64,
    /// Base URL for share links, without a trailing slash.
    pub public_base_url: String,
}

impl Default for FileServiceOptions {
    fn default() -> Self {
        Self {
            default_expiry_hours: DEFAULT_EXPIRY_HOURS,
            default_max_downloads: DEFAULT_MAX_DOWNLOADS,
            max_upload_size: 100 * 1024 * 1024,
            max_access_log_entries: 1000,
            public_base_url: "http://localhost:8080".to_string(),
        }
    }
}

impl FileServiceOptions {
    /// Build options from the application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            default_expiry_hours: config.lifecycle.default_expiry_hours,
            default_max_downloads: config.lifecycle.default_max_downloads,
            max_upload_size: config.storage.max_upload_size_bytes(),
            max_access_log_entries: config.lifecycle.max_access_log_entries,
            public_base_url: config.web.public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// File service managing uploads, downloads and deletion.
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    stats: Arc<dyn UserStatsStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    recorder: AccessRecorder,
    options: FileServiceOptions,
}

impl FileService {
    /// Create a new FileService.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        stats: Arc<dyn UserStatsStore>,
        clock: Arc<dyn Clock>,
        options: FileServiceOptions,
    ) -> Self {
        let recorder = AccessRecorder::new(
            metadata.clone(),
            stats.clone(),
            clock.clone(),
            options.max_access_log_entries,
        );
        Self {
            metadata,
            blobs,
            stats,
            notifier: Arc::new(LogNotifier),
            clock,
            recorder,
            options,
        }
    }

    /// Create a FileService whose metadata and user statistics live in `db`.
    pub fn with_database(
        db: &Database,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        options: FileServiceOptions,
    ) -> Self {
        Self::new(
            Arc::new(SqliteMetadataStore::new(db.pool().clone())),
            blobs,
            Arc::new(SqliteUserStats::new(db.pool().clone())),
            clock,
            options,
        )
    }

    /// Use a different notifier for share links.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Metadata store shared with the sweeper and reconciler.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.metadata.clone()
    }

    /// Blob store shared with the sweeper and reconciler.
    pub fn blobs(&self) -> Arc<dyn BlobStore> {
        self.blobs.clone()
    }

    /// Clock used for lifecycle decisions.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }

    /// Service options.
    pub fn options(&self) -> &FileServiceOptions {
        &self.options
    }

    /// Upload a file.
    ///
    /// # Validation
    /// - Expiry: 1 to 168 hours
    /// - Filename: 1 to 255 characters
    /// - Content: non-empty, at most the configured size
    /// - Max downloads: at least 1
    ///
    /// The blob is written before the record is created. If the record cannot
    /// be saved the blob is removed on a best-effort basis; anything left
    /// behind is an orphan for the reconciler.
    pub async fn create_file(&self, request: UploadRequest) -> Result<FileRecord> {
        let now = self.clock.now();
        let expiry_hours = request
            .expiry_hours
            .unwrap_or(self.options.default_expiry_hours);
        let expires_at = policy::compute_expiry(now, expiry_hours)?;
        self.validate_upload(&request)?;

        let max_downloads = request
            .max_downloads
            .unwrap_or(self.options.default_max_downloads);
        let content_type =
            resolve_content_type(request.content_type.as_deref(), &request.original_name);
        let size = request.content.len() as i64;

        let blob = self
            .blobs
            .write(&request.content, &request.original_name)
            .await?;

        let new_file = NewFileRecord {
            original_name: request.original_name,
            stored_name: blob.stored_name,
            storage_path: blob.storage_path,
            content_type,
            size,
            created_at: now,
            expires_at,
            max_downloads,
            owner_id: request.owner_id,
        };

        let record = match self.metadata.create(&new_file).await {
            Ok(record) => record,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&new_file.storage_path).await {
                    warn!(
                        path = %new_file.storage_path,
                        "Failed to remove blob after metadata error: {}", cleanup
                    );
                }
                return Err(e);
            }
        };

        if let Some(owner_id) = record.owner_id {
            if let Err(e) = self.stats.record_upload(owner_id, record.size).await {
                warn!(file_id = %record.id, owner_id, "Failed to update upload stats: {}", e);
            }
        }

        info!(
            file_id = %record.id,
            size = record.size,
            expires_at = %record.expires_at,
            "File uploaded"
        );
        Ok(record)
    }

    fn validate_upload(&self, request: &UploadRequest) -> Result<()> {
        let name_len = request.original_name.chars().count();
        if name_len == 0 || request.original_name.trim().is_empty() {
            return Err(ShareError::Validation("filename is required".to_string()));
        }
        if name_len > MAX_FILENAME_LENGTH {
            return Err(ShareError::Validation(format!(
                "filename must be at most {MAX_FILENAME_LENGTH} characters"
            )));
        }
        if request.content.is_empty() {
            return Err(ShareError::Validation("file is empty".to_string()));
        }
        if request.content.len() as u64 > self.options.max_upload_size {
            let max_mb = self.options.max_upload_size / 1024 / 1024;
            return Err(ShareError::Validation(format!(
                "file is too large (max {max_mb}MB)"
            )));
        }
        if let Some(max_downloads) = request.max_downloads {
            if max_downloads < 1 {
                return Err(ShareError::Validation(
                    "max_downloads must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }

    async fn find(&self, id: Uuid) -> Result<FileRecord> {
        self.metadata
            .get(id)
            .await?
            .ok_or_else(|| ShareError::NotFound(format!("file {id}")))
    }

    /// Get a servable file's record.
    pub async fn get_file_info(&self, id: Uuid) -> Result<FileRecord> {
        let record = self.find(id).await?;
        policy::check_available(&record, self.clock.now())?;
        Ok(record)
    }

    /// Download a file, counting the download.
    pub async fn download_file(&self, id: Uuid, requester: &RequesterInfo) -> Result<DownloadResult> {
        let record = self.find(id).await?;
        policy::check_available(&record, self.clock.now())?;

        let content = match self.blobs.read(&record.storage_path).await {
            Ok(content) => content,
            Err(ShareError::NotFound(_)) => {
                error!(
                    file_id = %record.id,
                    path = %record.storage_path,
                    "Blob missing for file record"
                );
                return Err(ShareError::StorageInconsistency(format!(
                    "blob for file {} is missing",
                    record.id
                )));
            }
            Err(e) => return Err(e),
        };

        let record = self.recorder.record(&record, requester).await?;
        debug!(file_id = %record.id, count = record.download_count, "File downloaded");

        Ok(DownloadResult { record, content })
    }

    /// Delete a file.
    ///
    /// Files with an owner can only be deleted by that owner; anonymous files
    /// can be deleted by anyone holding the ID.
    pub async fn delete_file(&self, id: Uuid, requester: Option<i64>) -> Result<()> {
        let record = self.find(id).await?;

        if let Some(owner_id) = record.owner_id {
            if requester != Some(owner_id) {
                return Err(ShareError::Forbidden(
                    "only the owner can delete this file".to_string(),
                ));
            }
        }

        self.blobs.delete(&record.storage_path).await?;
        if !self.metadata.delete(id).await? {
            return Err(ShareError::NotFound(format!("file {id}")));
        }

        info!(file_id = %id, "File deleted");
        Ok(())
    }

    /// List an owner's files, newest first. Pages start at 1.
    pub async fn list_owner_files(
        &self,
        owner_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<OwnerFiles> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let files = self
            .metadata
            .list_by_owner(owner_id, page, page_size)
            .await?;
        let total = self.metadata.count_by_owner(owner_id).await?;

        Ok(OwnerFiles {
            files,
            total,
            page,
            page_size,
        })
    }

    /// Public download link for a file.
    pub fn share_link(&self, id: Uuid) -> String {
        format!("{}/api/files/{id}/download", self.options.public_base_url)
    }

    /// Time left before a record expires.
    pub fn time_remaining(&self, record: &FileRecord) -> Duration {
        policy::time_remaining(record, self.clock.now())
    }

    /// Email a share link for a servable file.
    ///
    /// Dispatch is fire-and-forget: a notifier failure is logged and never
    /// reported to the caller. Returns the link.
    pub async fn send_share_link(&self, id: Uuid, recipient: &str) -> Result<String> {
        if !recipient.validate_email() {
            return Err(ShareError::Validation(format!(
                "invalid email address: {recipient}"
            )));
        }

        let record = self.get_file_info(id).await?;
        let link = self.share_link(id);
        let notice = ShareNotice {
            recipient: recipient.to_string(),
            file_name: record.original_name.clone(),
            link: link.clone(),
            expires_in: format_remaining(self.time_remaining(&record)),
        };

        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(e) = notifier.send_share_link(&notice).await {
                warn!(recipient = %notice.recipient, "Failed to send share link: {}", e);
            }
        });

        Ok(link)
    }
}
