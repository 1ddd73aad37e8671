//! File metadata store for sharebox.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::record::{AccessLogEntry, FileRecord, NewFileRecord};
use crate::datetime::{from_millis, to_millis};
use crate::{Result, ShareError};

/// Persistence contract for file records.
///
/// Every mutation targets exactly one record.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record, generating its public ID.
    async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord>;

    /// Find a record (with its access log) by ID.
    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>>;

    /// One page of an owner's records, newest first. Pages start at 1.
    async fn list_by_owner(&self, owner_id: i64, page: i64, page_size: i64)
        -> Result<Vec<FileRecord>>;

    /// Total records owned by `owner_id`.
    async fn count_by_owner(&self, owner_id: i64) -> Result<i64>;

    /// All records whose expiry timestamp is before `now`.
    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>>;

    /// Delete a record. Returns `false` if it did not exist.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Count one download and append its access entry in a single save.
    ///
    /// The increment only applies while the record is unexpired and under its
    /// download limit at `entry.accessed_at`; otherwise `None` is returned and
    /// nothing changes. `log_cap` bounds the access log (0 = unbounded).
    async fn record_download(
        &self,
        id: Uuid,
        entry: &AccessLogEntry,
        log_cap: i64,
    ) -> Result<Option<FileRecord>>;

    /// Storage paths referenced by any record.
    async fn list_storage_paths(&self) -> Result<Vec<String>>;
}

const FILE_COLUMNS: &str = "id, original_name, stored_name, storage_path, content_type, size,
     created_at, expires_at, download_count, max_downloads, is_expired, owner_id";

#[derive(sqlx::FromRow)]
struct FileRow {
    id: String,
    original_name: String,
    stored_name: String,
    storage_path: String,
    content_type: String,
    size: i64,
    created_at: i64,
    expires_at: i64,
    download_count: i64,
    max_downloads: i64,
    is_expired: bool,
    owner_id: Option<i64>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = ShareError;

    fn try_from(row: FileRow) -> Result<Self> {
        let id = Uuid::parse_str(&row.id)
            .map_err(|e| ShareError::Database(format!("invalid file id {:?}: {e}", row.id)))?;

        Ok(FileRecord {
            id,
            original_name: row.original_name,
            stored_name: row.stored_name,
            storage_path: row.storage_path,
            content_type: row.content_type,
            size: row.size,
            created_at: from_millis(row.created_at),
            expires_at: from_millis(row.expires_at),
            download_count: row.download_count,
            max_downloads: row.max_downloads,
            is_expired: row.is_expired,
            owner_id: row.owner_id,
            access_log: Vec::new(),
        })
    }
}

#[derive(sqlx::FromRow)]
struct AccessRow {
    origin: String,
    user_agent: String,
    accessed_at: i64,
}

impl From<AccessRow> for AccessLogEntry {
    fn from(row: AccessRow) -> Self {
        AccessLogEntry {
            origin: row.origin,
            user_agent: row.user_agent,
            accessed_at: from_millis(row.accessed_at),
        }
    }
}

fn into_records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
    rows.into_iter().map(FileRecord::try_from).collect()
}

/// Load one record and its access log (oldest first) on `conn`.
async fn fetch_record(conn: &mut SqliteConnection, id: Uuid) -> Result<Option<FileRecord>> {
    let row = sqlx::query_as::<_, FileRow>(&format!(
        "SELECT {FILE_COLUMNS} FROM files WHERE id = ?"
    ))
    .bind(id.to_string())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let log = sqlx::query_as::<_, AccessRow>(
        "SELECT origin, user_agent, accessed_at FROM file_access_log
         WHERE file_id = ? ORDER BY id ASC",
    )
    .bind(id.to_string())
    .fetch_all(&mut *conn)
    .await?;

    let mut record = FileRecord::try_from(row)?;
    record.access_log = log.into_iter().map(AccessLogEntry::from).collect();
    Ok(Some(record))
}

/// Repository for file metadata operations.
pub struct FileRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> FileRepository<'a> {
    /// Create a new FileRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new file record.
    pub async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        let id = Uuid::new_v4();
        let is_expired = new_file.created_at > new_file.expires_at;

        sqlx::query(
            "INSERT INTO files (id, original_name, stored_name, storage_path, content_type, size,
                                created_at, expires_at, max_downloads, is_expired, owner_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&new_file.original_name)
        .bind(&new_file.stored_name)
        .bind(&new_file.storage_path)
        .bind(&new_file.content_type)
        .bind(new_file.size)
        .bind(to_millis(&new_file.created_at))
        .bind(to_millis(&new_file.expires_at))
        .bind(new_file.max_downloads)
        .bind(is_expired)
        .bind(new_file.owner_id)
        .execute(self.pool)
        .await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShareError::NotFound(format!("file {id}")))
    }

    /// Get a file by ID, including its access log.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let mut conn = self.pool.acquire().await?;
        fetch_record(&mut *conn, id).await
    }

    /// List files owned by a user (ordered by created_at descending).
    pub async fn list_by_owner(
        &self,
        owner_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<FileRecord>> {
        let page = page.max(1);
        let page_size = page_size.max(1);
        let offset = (page - 1) * page_size;

        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE owner_id = ?
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(owner_id)
        .bind(page_size)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        into_records(rows)
    }

    /// Count files owned by a user.
    pub async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM files WHERE owner_id = ?")
            .bind(owner_id)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// List files whose expiry timestamp is before `now`, oldest expiry first.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE expires_at < ? ORDER BY expires_at ASC"
        ))
        .bind(to_millis(&now))
        .fetch_all(self.pool)
        .await?;

        into_records(rows)
    }

    /// Delete a file by ID. The access log goes with it.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE id = ?")
            .bind(id.to_string())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Conditionally count a download and append its access-log entry.
    pub async fn record_download(
        &self,
        id: Uuid,
        entry: &AccessLogEntry,
        log_cap: i64,
    ) -> Result<Option<FileRecord>> {
        let now_ms = to_millis(&entry.accessed_at);
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE files
             SET download_count = download_count + 1, is_expired = (? > expires_at)
             WHERE id = ? AND download_count < max_downloads AND expires_at >= ?",
        )
        .bind(now_ms)
        .bind(id.to_string())
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        sqlx::query(
            "INSERT INTO file_access_log (file_id, origin, user_agent, accessed_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&entry.origin)
        .bind(&entry.user_agent)
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        if log_cap > 0 {
            sqlx::query(
                "DELETE FROM file_access_log
                 WHERE file_id = ?1 AND id NOT IN (
                     SELECT id FROM file_access_log WHERE file_id = ?1 ORDER BY id DESC LIMIT ?2
                 )",
            )
            .bind(id.to_string())
            .bind(log_cap)
            .execute(&mut *tx)
            .await?;
        }

        // Read back inside the transaction; the record may be deleted right after commit.
        let record = fetch_record(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(record)
    }

    /// Storage paths of every record.
    pub async fn list_storage_paths(&self) -> Result<Vec<String>> {
        let paths: Vec<String> = sqlx::query_scalar("SELECT storage_path FROM files")
            .fetch_all(self.pool)
            .await?;
        Ok(paths)
    }
}

/// [`MetadataStore`] backed by SQLite.
#[derive(Debug, Clone)]
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    /// Create a metadata store sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn repo(&self) -> FileRepository<'_> {
        FileRepository::new(&self.pool)
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create(&self, new_file: &NewFileRecord) -> Result<FileRecord> {
        self.repo().create(new_file).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
        self.repo().get_by_id(id).await
    }

    async fn list_by_owner(
        &self,
        owner_id: i64,
        page: i64,
        page_size: i64,
    ) -> Result<Vec<FileRecord>> {
        self.repo().list_by_owner(owner_id, page, page_size).await
    }

    async fn count_by_owner(&self, owner_id: i64) -> Result<i64> {
        self.repo().count_by_owner(owner_id).await
    }

    async fn find_expired(&self, now: DateTime<Utc>) -> Result<Vec<FileRecord>> {
        self.repo().list_expired(now).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        self.repo().delete(id).await
    }

    async fn record_download(
        &self,
        id: Uuid,
        entry: &AccessLogEntry,
        log_cap: i64,
    ) -> Result<Option<FileRecord>> {
        self.repo().record_download(id, entry, log_cap).await
    }

    async fn list_storage_paths(&self) -> Result<Vec<String>> {
        self.repo().list_storage_paths().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{NewUser, UserRepository};
    use crate::Database;
    use chrono::{Duration, TimeZone};

    async fn setup_db() -> Database {
        Database::open_in_memory().await.unwrap()
    }

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn new_file(name: &str, created_at: DateTime<Utc>, owner_id: Option<i64>) -> NewFileRecord {
        let stored_name = format!("{}.txt", Uuid::new_v4());
        NewFileRecord {
            original_name: name.to_string(),
            storage_path: format!("{}/{}", &stored_name[..2], stored_name),
            stored_name,
            content_type: "text/plain".to_string(),
            size: 42,
            created_at,
            expires_at: created_at + Duration::hours(24),
            max_downloads: 100,
            owner_id,
        }
    }

    fn entry(at: DateTime<Utc>) -> AccessLogEntry {
        AccessLogEntry {
            origin: "127.0.0.1".to_string(),
            user_agent: "test-agent".to_string(),
            accessed_at: at,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let created = repo
            .create(&new_file("report.txt", base_time(), None))
            .await
            .unwrap();

        assert_eq!(created.original_name, "report.txt");
        assert_eq!(created.size, 42);
        assert_eq!(created.download_count, 0);
        assert_eq!(created.max_downloads, 100);
        assert!(!created.is_expired);
        assert_eq!(created.owner_id, None);
        assert_eq!(created.created_at, base_time());
        assert_eq!(created.expires_at, base_time() + Duration::hours(24));

        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found, created);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_owner_paginates_newest_first() {
        let db = setup_db().await;
        let user = UserRepository::new(db.pool())
            .create(&NewUser::new("alice"))
            .await
            .unwrap();
        let repo = FileRepository::new(db.pool());

        for i in 0..5 {
            repo.create(&new_file(
                &format!("file{i}.txt"),
                base_time() + Duration::minutes(i),
                Some(user.id),
            ))
            .await
            .unwrap();
        }
        repo.create(&new_file("anon.txt", base_time(), None))
            .await
            .unwrap();

        assert_eq!(repo.count_by_owner(user.id).await.unwrap(), 5);

        let page1 = repo.list_by_owner(user.id, 1, 2).await.unwrap();
        let names: Vec<_> = page1.iter().map(|f| f.original_name.as_str()).collect();
        assert_eq!(names, vec!["file4.txt", "file3.txt"]);

        let page3 = repo.list_by_owner(user.id, 3, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert_eq!(page3[0].original_name, "file0.txt");

        assert!(repo.list_by_owner(user.id, 4, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_expired_uses_timestamp() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());

        let old = repo
            .create(&new_file("old.txt", base_time() - Duration::hours(48), None))
            .await
            .unwrap();
        repo.create(&new_file("fresh.txt", base_time(), None))
            .await
            .unwrap();

        // The cached flag is still false for the old record.
        assert!(!old.is_expired);

        let expired = repo.list_expired(base_time()).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, old.id);
    }

    #[tokio::test]
    async fn test_delete() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo
            .create(&new_file("gone.txt", base_time(), None))
            .await
            .unwrap();

        assert!(repo.delete(file.id).await.unwrap());
        assert!(!repo.delete(file.id).await.unwrap());
        assert!(repo.get_by_id(file.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_download_appends_log() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo
            .create(&new_file("a.txt", base_time(), None))
            .await
            .unwrap();

        let at = base_time() + Duration::minutes(5);
        let updated = repo
            .record_download(file.id, &entry(at), 0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.download_count, 1);
        assert_eq!(updated.access_log.len(), 1);
        assert_eq!(updated.access_log[0].origin, "127.0.0.1");
        assert_eq!(updated.access_log[0].accessed_at, at);
    }

    #[tokio::test]
    async fn test_record_download_respects_limit() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let mut nf = new_file("limited.txt", base_time(), None);
        nf.max_downloads = 1;
        let file = repo.create(&nf).await.unwrap();

        let at = base_time() + Duration::minutes(1);
        assert!(repo
            .record_download(file.id, &entry(at), 0)
            .await
            .unwrap()
            .is_some());
        assert!(repo
            .record_download(file.id, &entry(at), 0)
            .await
            .unwrap()
            .is_none());

        let file = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(file.download_count, 1);
        assert_eq!(file.access_log.len(), 1);
    }

    #[tokio::test]
    async fn test_record_download_rejects_expired() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo
            .create(&new_file("late.txt", base_time(), None))
            .await
            .unwrap();

        let at = base_time() + Duration::hours(25);
        assert!(repo
            .record_download(file.id, &entry(at), 0)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_record_download_caps_log() {
        let db = setup_db().await;
        let repo = FileRepository::new(db.pool());
        let file = repo
            .create(&new_file("busy.txt", base_time(), None))
            .await
            .unwrap();

        for i in 0..5 {
            repo.record_download(file.id, &entry(base_time() + Duration::minutes(i)), 3)
                .await
                .unwrap();
        }

        let file = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(file.download_count, 5);
        assert_eq!(file.access_log.len(), 3);
        assert_eq!(
            file.access_log[0].accessed_at,
            base_time() + Duration::minutes(2)
        );
    }

    #[tokio::test]
    async fn test_owner_delete_makes_file_anonymous() {
        let db = setup_db().await;
        let users = UserRepository::new(db.pool());
        let user = users.create(&NewUser::new("bob")).await.unwrap();
        let repo = FileRepository::new(db.pool());
        let file = repo
            .create(&new_file("b.txt", base_time(), Some(user.id)))
            .await
            .unwrap();

        users.delete(user.id).await.unwrap();

        let file = repo.get_by_id(file.id).await.unwrap().unwrap();
        assert_eq!(file.owner_id, None);
    }

    #[tokio::test]
    async fn test_list_storage_paths() {
        let db = setup_db().await;
        let store = SqliteMetadataStore::new(db.pool().clone());

        let a = store
            .create(&new_file("a.txt", base_time(), None))
            .await
            .unwrap();
        let b = store
            .create(&new_file("b.txt", base_time(), None))
            .await
            .unwrap();

        let mut paths = store.list_storage_paths().await.unwrap();
        paths.sort();
        let mut expected = vec![a.storage_path, b.storage_path];
        expected.sort();
        assert_eq!(paths, expected);
    }
}
