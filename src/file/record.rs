//! File record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored file and its lifecycle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Public identifier used in share links.
    pub id: Uuid,
    /// Display name supplied by the uploader.
    pub original_name: String,
    /// Name of the blob on disk (UUID.ext format).
    pub stored_name: String,
    /// Blob location relative to the storage root.
    pub storage_path: String,
    /// MIME type served on download.
    pub content_type: String,
    /// Size in bytes.
    pub size: i64,
    /// Upload time.
    pub created_at: DateTime<Utc>,
    /// Time after which the file is no longer served.
    pub expires_at: DateTime<Utc>,
    /// Successful downloads so far.
    pub download_count: i64,
    /// Downloads allowed before the file is gone.
    pub max_downloads: i64,
    /// Expiry state as of the last save. May be stale; never used for sweeping.
    pub is_expired: bool,
    /// Owning user, `None` for anonymous uploads.
    pub owner_id: Option<i64>,
    /// Access history, oldest first.
    ///
    /// Only single-record lookups populate this; listings leave it empty.
    pub access_log: Vec<AccessLogEntry>,
}

impl FileRecord {
    /// Whether `user_id` owns this record.
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }
}

/// Data for creating a new file record.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub original_name: String,
    pub stored_name: String,
    pub storage_path: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub max_downloads: i64,
    pub owner_id: Option<i64>,
}

/// One successful download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    /// Client address (IP or forwarded-for value).
    pub origin: String,
    /// Client user agent.
    pub user_agent: String,
    /// When the download happened.
    pub accessed_at: DateTime<Utc>,
}

/// Who is downloading a file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequesterInfo {
    pub origin: String,
    pub user_agent: String,
}

impl RequesterInfo {
    /// Create requester info from an origin address and user agent.
    pub fn new(origin: impl Into<String>, user_agent: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            user_agent: user_agent.into(),
        }
    }

    /// Build the access-log entry for a download at `at`.
    pub fn to_entry(&self, at: DateTime<Utc>) -> AccessLogEntry {
        AccessLogEntry {
            origin: self.origin.clone(),
            user_agent: self.user_agent.clone(),
            accessed_at: at,
        }
    }
}
