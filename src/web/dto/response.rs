//! Response DTOs for the HTTP API.

use serde::Serialize;

use crate::datetime::{format_remaining, to_rfc3339};
use crate::file::{AccessLogEntry, FileRecord};
use crate::lifecycle::FileService;

// ============================================================================
// Generic Response Wrappers
// ============================================================================

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Paginated response wrapper.
#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T: Serialize> {
    /// Response data.
    pub data: Vec<T>,
    /// Pagination metadata.
    pub meta: PaginationMeta,
}

impl<T: Serialize> PaginatedResponse<T> {
    /// Create a new paginated response.
    pub fn new(data: Vec<T>, page: u32, per_page: u32, total: u64) -> Self {
        Self {
            data,
            meta: PaginationMeta {
                page,
                per_page,
                total,
            },
        }
    }
}

/// Pagination metadata.
#[derive(Debug, Serialize)]
pub struct PaginationMeta {
    /// Current page number.
    pub page: u32,
    /// Items per page.
    pub per_page: u32,
    /// Total number of items.
    pub total: u64,
}

// ============================================================================
// File DTOs
// ============================================================================

/// File information.
#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub id: String,
    pub name: String,
    pub content_type: String,
    pub size: i64,
    pub created_at: String,
    pub expires_at: String,
    /// Remaining lifetime, e.g. "23h 59m".
    pub expires_in: String,
    pub download_count: i64,
    pub max_downloads: i64,
    pub downloads_remaining: i64,
    pub share_link: String,
}

impl FileResponse {
    /// Build the response for a record.
    pub fn from_record(record: &FileRecord, service: &FileService) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.original_name.clone(),
            content_type: record.content_type.clone(),
            size: record.size,
            created_at: to_rfc3339(&record.created_at),
            expires_at: to_rfc3339(&record.expires_at),
            expires_in: format_remaining(service.time_remaining(record)),
            download_count: record.download_count,
            max_downloads: record.max_downloads,
            downloads_remaining: (record.max_downloads - record.download_count).max(0),
            share_link: service.share_link(record.id),
        }
    }
}

/// File information plus access history, which only the owner sees.
#[derive(Debug, Serialize)]
pub struct FileDetailResponse {
    #[serde(flatten)]
    pub file: FileResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_log: Option<Vec<AccessLogResponse>>,
}

/// One access-log entry.
#[derive(Debug, Serialize)]
pub struct AccessLogResponse {
    pub origin: String,
    pub user_agent: String,
    pub accessed_at: String,
}

impl From<&AccessLogEntry> for AccessLogResponse {
    fn from(entry: &AccessLogEntry) -> Self {
        Self {
            origin: entry.origin.clone(),
            user_agent: entry.user_agent.clone(),
            accessed_at: to_rfc3339(&entry.accessed_at),
        }
    }
}

/// Share-by-email result.
#[derive(Debug, Serialize)]
pub struct ShareResponse {
    pub link: String,
}

/// Simple acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Scheduler state for the admin API.
#[derive(Debug, Serialize)]
pub struct SchedulerStatusResponse {
    pub running: bool,
}
