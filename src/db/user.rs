//! User model and repository for sharebox.
//!
//! Accounts themselves are issued elsewhere; this module only keeps the rows
//! that own files and their aggregate upload/download statistics.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::datetime::{from_millis, to_millis};
use crate::{Result, ShareError};

/// A registered user that can own files.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Login username (unique).
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
    /// Number of files uploaded.
    pub upload_count: i64,
    /// Number of downloads of files owned by this user.
    pub download_count: i64,
    /// Total bytes uploaded.
    pub bytes_uploaded: i64,
    /// Account creation time (epoch milliseconds).
    pub created_at: i64,
}

impl User {
    /// Get the created_at as DateTime<Utc>.
    pub fn created_at_datetime(&self) -> DateTime<Utc> {
        from_millis(self.created_at)
    }
}

/// Data for creating a new user.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Login username.
    pub username: String,
    /// Email address (optional).
    pub email: Option<String>,
}

impl NewUser {
    /// Create a new user with the given username.
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: None,
        }
    }

    /// Set the email address.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}

/// Repository for user operations.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    /// Create a new UserRepository with the given database pool reference.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new user.
    pub async fn create(&self, new_user: &NewUser) -> Result<User> {
        let result = sqlx::query("INSERT INTO users (username, email, created_at) VALUES (?, ?, ?)")
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(to_millis(&Utc::now()))
            .execute(self.pool)
            .await?;

        let id = result.last_insert_rowid();
        self.get_by_id(id)
            .await?
            .ok_or_else(|| ShareError::NotFound("user".to_string()))
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, upload_count, download_count, bytes_uploaded, created_at
             FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, email, upload_count, download_count, bytes_uploaded, created_at
             FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(user)
    }

    /// Delete a user by ID.
    ///
    /// Files owned by the user become anonymous and keep their expiry.
    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one upload of `bytes` to the user's statistics.
    pub async fn increment_uploads(&self, id: i64, bytes: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE users SET upload_count = upload_count + 1, bytes_uploaded = bytes_uploaded + ?
             WHERE id = ?",
        )
        .bind(bytes)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add one download to the user's statistics.
    pub async fn increment_downloads(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET download_count = download_count + 1 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// Incremental per-user statistics consumed by the file lifecycle.
///
/// Updates are best-effort side effects of uploads and downloads.
#[async_trait]
pub trait UserStatsStore: Send + Sync {
    /// Record one upload of `bytes` by `user_id`.
    async fn record_upload(&self, user_id: i64, bytes: i64) -> Result<()>;

    /// Record one download of a file owned by `user_id`.
    async fn record_download(&self, user_id: i64) -> Result<()>;
}

/// [`UserStatsStore`] backed by the `users` table.
#[derive(Debug, Clone)]
pub struct SqliteUserStats {
    pool: SqlitePool,
}

impl SqliteUserStats {
    /// Create a stats store sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStatsStore for SqliteUserStats {
    async fn record_upload(&self, user_id: i64, bytes: i64) -> Result<()> {
        if UserRepository::new(&self.pool)
            .increment_uploads(user_id, bytes)
            .await?
        {
            Ok(())
        } else {
            Err(ShareError::NotFound(format!("user {user_id}")))
        }
    }

    async fn record_download(&self, user_id: i64) -> Result<()> {
        if UserRepository::new(&self.pool)
            .increment_downloads(user_id)
            .await?
        {
            Ok(())
        } else {
            Err(ShareError::NotFound(format!("user {user_id}")))
        }
    }
}

/// Aggregate statistics for one user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UserStats {
    pub upload_count: i64,
    pub download_count: i64,
    pub bytes_uploaded: i64,
}

/// In-memory [`UserStatsStore`] for tests. Every user ID is accepted.
#[derive(Debug, Default)]
pub struct MemoryUserStats {
    stats: Mutex<HashMap<i64, UserStats>>,
}

impl MemoryUserStats {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current statistics for a user (zeroes if never seen).
    pub fn get(&self, user_id: i64) -> UserStats {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&user_id)
            .copied()
            .unwrap_or_default()
    }
}

#[async_trait]
impl UserStatsStore for MemoryUserStats {
    async fn record_upload(&self, user_id: i64, bytes: i64) -> Result<()> {
        let mut stats = self.stats.lock().unwrap_or_else(|e| e.into_inner());
        let entry = stats.entry(user_id).or_default();
        entry.upload_count += 1;
        entry.bytes_uploaded += bytes;
        Ok(())
    }

    async fn record_download(&self, user_id: i64) -> Result<()> {
        self.stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(user_id)
            .or_default()
            .download_count += 1;
        Ok(())
    }
}
