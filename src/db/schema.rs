//! Database schema and migrations for sharebox.
//!
//! Migrations are applied in order when the database is opened. The
//! `schema_version` table tracks which ones have run.

/// Database migrations.
///
/// All timestamps are UTC epoch milliseconds.
pub const MIGRATIONS: &[&str] = &[
    // v1: users with incrementally maintained statistics
    r#"
CREATE TABLE users (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    username        TEXT NOT NULL UNIQUE,
    email           TEXT,
    upload_count    INTEGER NOT NULL DEFAULT 0,
    download_count  INTEGER NOT NULL DEFAULT 0,
    bytes_uploaded  INTEGER NOT NULL DEFAULT 0,
    created_at      INTEGER NOT NULL
);

CREATE INDEX idx_users_username ON users(username);
"#,
    // v2: shared files
    r#"
CREATE TABLE files (
    id              TEXT PRIMARY KEY,               -- public UUID, used in links
    original_name   TEXT NOT NULL,
    stored_name     TEXT NOT NULL UNIQUE,
    storage_path    TEXT NOT NULL UNIQUE,           -- relative to the blob root
    content_type    TEXT NOT NULL,
    size            INTEGER NOT NULL,
    created_at      INTEGER NOT NULL,
    expires_at      INTEGER NOT NULL,
    download_count  INTEGER NOT NULL DEFAULT 0,
    max_downloads   INTEGER NOT NULL DEFAULT 100,
    is_expired      INTEGER NOT NULL DEFAULT 0,     -- cached, recomputed on save
    owner_id        INTEGER REFERENCES users(id) ON DELETE SET NULL
);

CREATE INDEX idx_files_expires_at ON files(expires_at);
CREATE INDEX idx_files_owner_created ON files(owner_id, created_at);
"#,
    // v3: per-file access log
    r#"
CREATE TABLE file_access_log (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id      TEXT NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    origin       TEXT NOT NULL,
    user_agent   TEXT NOT NULL,
    accessed_at  INTEGER NOT NULL
);

CREATE INDEX idx_file_access_log_file_id ON file_access_log(file_id, id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_files_migration_columns() {
        let files = MIGRATIONS[1];
        assert!(files.contains("CREATE TABLE files"));
        assert!(files.contains("expires_at"));
        assert!(files.contains("max_downloads"));
        assert!(files.contains("is_expired"));
        assert!(files.contains("storage_path"));
    }

    #[test]
    fn test_access_log_cascades() {
        assert!(MIGRATIONS[2].contains("ON DELETE CASCADE"));
    }
}
