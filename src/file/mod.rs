//! File storage and metadata for sharebox.
//!
//! This module provides:
//! - File records and their access log
//! - The metadata store (SQLite)
//! - Blob storage with UUID naming, on disk
//! - In-memory stores for tests

mod memory;
mod metadata;
mod record;
mod storage;

pub use memory::{MemoryBlobStore, MemoryMetadataStore};
pub use metadata::{FileRepository, MetadataStore, SqliteMetadataStore};
pub use record::{AccessLogEntry, FileRecord, NewFileRecord, RequesterInfo};
pub use storage::{generate_stored_name, storage_path_for, BlobStore, FileStorage, StoredBlob};

/// Maximum length for an original filename (in characters).
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Content type used when none is supplied or guessable.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Resolve the content type for an upload.
///
/// An explicit, non-empty type wins; otherwise it is guessed from the file
/// name.
pub fn resolve_content_type(explicit: Option<&str>, original_name: &str) -> String {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(ct) => ct.to_string(),
        None => mime_guess::from_path(original_name)
            .first_raw()
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string(),
    }
}
