//! Blob storage for sharebox.
//!
//! Blobs are addressed by a storage path relative to the managed root:
//! `{shard}/{stored_name}`, where the stored name is `UUID.ext` and the shard
//! is its first 2 characters.

use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::{Result, ShareError};

/// Location of a newly written blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    /// Generated file name (UUID.ext format).
    pub stored_name: String,
    /// Path relative to the storage root.
    pub storage_path: String,
}

/// Raw byte storage contract.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write bytes to a newly generated path.
    async fn write(&self, content: &[u8], original_name: &str) -> Result<StoredBlob>;

    /// Read a blob. A missing blob is `NotFound`.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Delete a blob. Returns `false` if it was already absent.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Check whether a blob exists.
    async fn exists(&self, path: &str) -> Result<bool>;

    /// Every blob path under the managed root.
    async fn list(&self) -> Result<Vec<String>>;

    /// Remove empty shard directories. Returns how many were removed.
    async fn prune_empty_dirs(&self) -> Result<usize>;
}

/// Longest original extension carried into a stored name.
const MAX_EXTENSION_LEN: usize = 16;

/// Generate a new UUID-based stored name keeping the original extension.
///
/// Only short ASCII alphanumeric extensions are kept; anything else,
/// including no extension at all, becomes "bin".
pub fn generate_stored_name(original_name: &str) -> String {
    let ext = Path::new(original_name)
        .extension()
        .and_then(|s| s.to_str())
        .filter(|ext| {
            !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.bytes().all(|b| b.is_ascii_alphanumeric())
        })
        .unwrap_or("bin");
    format!("{}.{ext}", Uuid::new_v4())
}

/// Write `content` to `file_path`, creating the parent shard on demand.
///
/// A shard that is missing at write time, including one just removed by
/// `prune_empty_dirs`, is created and the write retried once.
async fn write_blob(file_path: &Path, content: &[u8]) -> io::Result<()> {
    match fs::write(file_path, content).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let Some(parent) = file_path.parent() else {
                return Err(e);
            };
            debug!(dir = %parent.display(), "Creating shard directory");
            fs::create_dir_all(parent).await?;
            fs::write(file_path, content).await
        }
        result => result,
    }
}

/// Storage path (`{shard}/{stored_name}`) for a stored name.
pub fn storage_path_for(stored_name: &str) -> String {
    let shard = stored_name.get(..2).unwrap_or(stored_name);
    format!("{shard}/{stored_name}")
}

/// Disk-backed blob store.
///
/// ```text
/// {base_path}/
/// ├── ab/
/// │   └── ab12cd34-5678-90ab-cdef-123456789012.txt
/// └── cd/
///     └── cd90ab12-3456-7890-abcd-ef1234567890.bin
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at `base_path`, creating it if missing.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        std::fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Resolve a storage path to a location under the root.
    ///
    /// Only plain relative components are accepted.
    pub fn resolve(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let plain = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !plain {
            return Err(ShareError::Validation(format!(
                "invalid storage path: {path}"
            )));
        }
        Ok(self.base_path.join(relative))
    }
}

#[async_trait]
impl BlobStore for FileStorage {
    async fn write(&self, content: &[u8], original_name: &str) -> Result<StoredBlob> {
        let stored_name = generate_stored_name(original_name);
        let storage_path = storage_path_for(&stored_name);
        let file_path = self.resolve(&storage_path)?;
        write_blob(&file_path, content).await?;

        debug!(path = %storage_path, bytes = content.len(), "Blob written");
        Ok(StoredBlob {
            stored_name,
            storage_path,
        })
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        match fs::read(self.resolve(path)?).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ShareError::NotFound(format!("blob {path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        match fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, path: &str) -> Result<bool> {
        Ok(fs::try_exists(self.resolve(path)?).await?)
    }

    async fn list(&self) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        let mut shards = fs::read_dir(&self.base_path).await?;

        while let Some(shard) = shards.next_entry().await? {
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let shard_name = shard.file_name().to_string_lossy().into_owned();
            let mut entries = fs::read_dir(shard.path()).await?;
            while let Some(entry) = entries.next_entry().await? {
                if entry.file_type().await?.is_file() {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    paths.push(format!("{shard_name}/{name}"));
                }
            }
        }

        Ok(paths)
    }

    async fn prune_empty_dirs(&self) -> Result<usize> {
        let mut removed = 0;
        let mut shards = fs::read_dir(&self.base_path).await?;

        while let Some(shard) = shards.next_entry().await? {
            let path = shard.path();
            if !shard.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(&path).await?;
            // A concurrent upload may repopulate the shard; remove_dir then fails and we skip it.
            if entries.next_entry().await?.is_none() && fs::remove_dir(&path).await.is_ok() {
                removed += 1;
            }
        }

        Ok(removed)
    }
}
