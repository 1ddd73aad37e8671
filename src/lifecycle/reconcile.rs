//! Orphan blob reconciliation.
//!
//! A blob is an orphan when no file record references its storage path, for
//! example after an upload whose record save failed.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::file::{BlobStore, MetadataStore};
use crate::Result;

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    /// Orphan blobs found.
    pub found: usize,
    /// Orphans removed.
    pub deleted: usize,
    /// Orphans that could not be removed.
    pub failed: usize,
    /// Empty shard directories removed afterwards.
    pub pruned_dirs: usize,
}

/// Finds and removes orphan blobs.
pub struct Reconciler {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
}

impl Reconciler {
    /// Create a new Reconciler.
    pub fn new(metadata: Arc<dyn MetadataStore>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { metadata, blobs }
    }

    /// Delete every blob no record references.
    ///
    /// Blobs are listed before records so a blob written after the listing is
    /// never considered. An upload caught between writing its blob and saving
    /// its record can still be removed.
    pub async fn reconcile_orphans(&self) -> Result<ReconcileReport> {
        let blob_paths = self.blobs.list().await?;
        let referenced: HashSet<String> =
            self.metadata.list_storage_paths().await?.into_iter().collect();

        let orphans: Vec<String> = blob_paths
            .into_iter()
            .filter(|path| !referenced.contains(path))
            .collect();

        let mut report = ReconcileReport {
            found: orphans.len(),
            ..ReconcileReport::default()
        };

        for path in &orphans {
            match self.blobs.delete(path).await {
                Ok(_) => {
                    debug!(path = %path, "Removed orphan blob");
                    report.deleted += 1;
                }
                Err(e) => {
                    warn!(path = %path, "Failed to remove orphan blob: {}", e);
                    report.failed += 1;
                }
            }
        }

        match self.blobs.prune_empty_dirs().await {
            Ok(pruned) => report.pruned_dirs = pruned,
            Err(e) => warn!("Failed to prune empty blob directories: {}", e),
        }

        if report.found > 0 {
            info!(
                found = report.found,
                deleted = report.deleted,
                failed = report.failed,
                "Reconcile pass complete"
            );
        } else {
            debug!("Reconcile pass found no orphan blobs");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{FileStorage, MemoryBlobStore, MemoryMetadataStore, NewFileRecord};
    use chrono::{Duration, Utc};

    async fn add_record(metadata: &MemoryMetadataStore, storage_path: &str) {
        let now = Utc::now();
        metadata
            .create(&NewFileRecord {
                original_name: "x".to_string(),
                stored_name: storage_path.rsplit('/').next().unwrap_or_default().to_string(),
                storage_path: storage_path.to_string(),
                content_type: "application/octet-stream".to_string(),
                size: 1,
                created_at: now,
                expires_at: now + Duration::hours(1),
                max_downloads: 1,
                owner_id: None,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_deletes_exactly_orphans() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        for path in ["aa/A.bin", "bb/B.bin", "cc/C.bin"] {
            blobs.insert(path, b"x".to_vec());
        }
        add_record(&metadata, "aa/A.bin").await;
        add_record(&metadata, "cc/C.bin").await;

        let reconciler = Reconciler::new(metadata.clone(), blobs.clone());
        let report = reconciler.reconcile_orphans().await.unwrap();

        assert_eq!(report.found, 1);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 0);
        assert!(blobs.contains("aa/A.bin"));
        assert!(!blobs.contains("bb/B.bin"));
        assert!(blobs.contains("cc/C.bin"));
    }

    #[tokio::test]
    async fn test_reconcile_counts_failures() {
        let blobs = Arc::new(MemoryBlobStore::new());
        let metadata = Arc::new(MemoryMetadataStore::new());
        blobs.insert("aa/orphan1.bin", b"x".to_vec());
        blobs.insert("bb/orphan2.bin", b"x".to_vec());
        blobs.fail_delete("bb/orphan2.bin");

        let report = Reconciler::new(metadata, blobs.clone())
            .reconcile_orphans()
            .await
            .unwrap();

        assert_eq!(report.found, 2);
        assert_eq!(report.deleted, 1);
        assert_eq!(report.failed, 1);
        assert!(blobs.contains("bb/orphan2.bin"));
    }

    #[tokio::test]
    async fn test_reconcile_on_disk_prunes_shards() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let storage = Arc::new(FileStorage::new(temp_dir.path()).unwrap());
        let metadata = Arc::new(MemoryMetadataStore::new());
        let orphan = storage.write(b"orphan", "o.txt").await.unwrap();

        let report = Reconciler::new(metadata, storage.clone())
            .reconcile_orphans()
            .await
            .unwrap();

        assert_eq!(report.deleted, 1);
        assert_eq!(report.pruned_dirs, 1);
        assert!(!storage.exists(&orphan.storage_path).await.unwrap());
        assert!(storage.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_nothing_to_do() {
        let report = Reconciler::new(
            Arc::new(MemoryMetadataStore::new()),
            Arc::new(MemoryBlobStore::new()),
        )
        .reconcile_orphans()
        .await
        .unwrap();

        assert_eq!(report, ReconcileReport::default());
    }
}
