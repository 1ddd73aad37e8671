//! In-memory stores.
//!
//! Used by tests to exercise sweep and reconcile failure handling without
//! touching the filesystem or SQLite.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::metadata::MetadataStore;
use super::record::{AccessLogEntry, FileRecord, NewFileRecord};
use super::storage::{generate_stored_name, storage_path_for, BlobStore, StoredBlob};
use crate::{Result, ShareError};

/// A [`BlobStore`] that keeps blobs in a map.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    failing_deletes: Mutex<HashSet<String>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a blob at an explicit path.
    pub fn insert(&self, path: impl Into<String>, content: impl Into<Vec<u8>>) {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into(), content.into());
    }

    /// Make deletes of `path` fail with an I/O error until cleared.
    pub fn fail_delete(&self, path: impl Into<String>) {
        self.failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.into());
    }

    /// Let deletes of `path` succeed again.
    pub fn clear_failure(&self, path: &str) {
        self.failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path);
    }

    /// Whether a blob is present.
    pub fn contains(&self, path: &str) -> bool {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(path)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(&self, content: &[u8], original_name: &str) -> Result<StoredBlob> {
        let stored_name = generate_stored_name(original_name);
        let storage_path = storage_path_for(&stored_name);
        self.insert(storage_path.clone(), content);
        Ok(StoredBlob {
            stored_name,
            storage_path,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
            .cloned()
            .ok_or_else(|| ShareError::NotFound(format!("blob {path}")))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        if self
            .failing_deletes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(path)
        {
            return Err(ShareError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{path} is locked"),
            )));
        }
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(path)
            .is_some())
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.contains(path))
    }

    async fn list(&self) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect())
    }

    async fn prune_empty_dirs(&self) -> Result<usize> {
        Ok(0)
    }
}

/// A [`MetadataStore`] that keeps records in insertion order.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    records: Mutex<Vec<FileRecord>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        let record = FileRecord {
            id: Uuid::new_v4(),
            original_name: new_file.original_name.clone(),
            stored_name: new_file.stored_name.clone(),
            storage_path: new_file.storage_path.clone(),
            content_type: new_file.content_type.clone(),
            size: new_file.size,
            created_at: new_file.created_at,
            expires_at: new_file.expires_at,
            download_count: 0,
            max_downloads: new_file.max_downloads,
            is_expired: new_file.created_at > new_file.expires_at,
            owner_id: new_file.owner_id,
            access_log: Vec::new(),
        };
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<FileRecord>> {
        let page_size = page_size.max(1) as usize;
        let offset = (page.max(1) as usize - 1) * page_size;

        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut owned: Vec<&FileRecord> = records
            .iter()
            .filter(|r| r.owner_id == Some(owner_id))
            .collect();
        // Stable sort keeps later inserts first among equal timestamps after reversing.
        owned.reverse();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(owned
            .into_iter()
            .skip(offset)
            .take(page_size)
            .map(|r| FileRecord {
                access_log: Vec::new(),
                ..r.clone()
            })
            .collect())
    }

    async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.owner_id == Some(owner_id))
            .count() as i64)
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.expires_at < now)
            .map(|r| FileRecord {
                access_log: Vec::new(),
                ..r.clone()
            })
            .collect())
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() < before)
    }

    async fn record_download(
        &self,
        id: Uuid,
        entry: &AccessLogEntry,
        log_cap: i64,
    ) -> Result<Option<FileRecord>> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if record.download_count >= record.max_downloads || entry.accessed_at > record.expires_at
        {
            return Ok(None);
        }

        record.download_count += 1;
        record.is_expired = entry.accessed_at > record.expires_at;
        record.access_log.push(entry.clone());
        if log_cap > 0 {
            let excess = record.access_log.len().saturating_sub(log_cap as usize);
            record.access_log.drain(..excess);
        }
        Ok(Some(record.clone()))
    }

    async fn list_storage_paths(&self) -> Result<Vec<String>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|r| r.storage_path.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_read_delete() {
        let store = MemoryBlobStore::new();

        let blob = store.write(b"abc", "a.txt").await.unwrap();
        assert_eq!(store.read(&blob.storage_path).await.unwrap(), b"abc");
        assert_eq!(store.len(), 1);

        assert!(store.delete(&blob.storage_path).await.unwrap());
        assert!(!store.delete(&blob.storage_path).await.unwrap());
        assert!(store.is_empty());
    }

    fn new_record(owner_id: Option<i64>, created_at: DateTime<Utc>) -> NewFileRecord {
        NewFileRecord {
            original_name: "a.txt".to_string(),
            stored_name: "ab.txt".to_string(),
            storage_path: "ab/ab.txt".to_string(),
            content_type: "text/plain".to_string(),
            size: 1,
            created_at,
            expires_at: created_at + chrono::Duration::hours(1),
            max_downloads: 2,
            owner_id,
        }
    }

    #[tokio::test]
    async fn test_metadata_record_download_limit() {
        let store = MemoryMetadataStore::new();
        let now = Utc::now();
        let record = store.create(&new_record(None, now)).await.unwrap();
        let entry = AccessLogEntry {
            origin: "o".to_string(),
            user_agent: "u".to_string(),
            accessed_at: now,
        };

        assert!(store.record_download(record.id, &entry, 1).await.unwrap().is_some());
        let second = store.record_download(record.id, &entry, 1).await.unwrap().unwrap();
        assert_eq!(second.download_count, 2);
        assert_eq!(second.access_log.len(), 1);
        assert!(store.record_download(record.id, &entry, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_metadata_list_by_owner_newest_first() {
        let store = MemoryMetadataStore::new();
        let now = Utc::now();
        let older = store.create(&new_record(Some(1), now)).await.unwrap();
        let newer = store
            .create(&new_record(Some(1), now + chrono::Duration::seconds(5)))
            .await
            .unwrap();
        store.create(&new_record(Some(2), now)).await.unwrap();

        let page = store.list_by_owner(1, 1, 10).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);
        assert_eq!(store.count_by_owner(1).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_fail_delete() {
        let store = MemoryBlobStore::new();
        store.insert("ab/locked.bin", b"x".to_vec());
        store.fail_delete("ab/locked.bin");

        let err = store.delete("ab/locked.bin").await.unwrap_err();
        assert!(err.is_transient());
        assert!(store.contains("ab/locked.bin"));

        store.clear_failure("ab/locked.bin");
        assert!(store.delete("ab/locked.bin").await.unwrap());
    }
}
