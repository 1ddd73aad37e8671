//! Error types for sharebox.

use std::fmt;

use thiserror::Error;

/// Why a file that still has a metadata record can no longer be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoneReason {
    /// The expiry timestamp has passed.
    Expired,
    /// The download counter reached the maximum allowed downloads.
    DownloadLimitReached,
}

impl GoneReason {
    /// Convert to a stable string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoneReason::Expired => "expired",
            GoneReason::DownloadLimitReached => "download limit reached",
        }
    }
}

impl fmt::Display for GoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common error type for sharebox.
#[derive(Error, Debug)]
pub enum ShareError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// The file exists but can no longer be served.
    #[error("file is no longer available: {0}")]
    Gone(GoneReason),

    /// Metadata exists but the blob it references is missing.
    #[error("storage inconsistency: {0}")]
    StorageInconsistency(String),

    /// Expiry horizon outside the allowed range.
    #[error("invalid expiry: {0} hours (allowed {min}-{max})", min = crate::lifecycle::MIN_EXPIRY_HOURS, max = crate::lifecycle::MAX_EXPIRY_HOURS)]
    InvalidExpiry(i64),

    /// The requester is not allowed to perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication error.
    #[error("authentication error: {0}")]
    Auth(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ShareError {
    /// Whether this error is a transient disk or metadata-store failure.
    ///
    /// Batch passes (sweep, reconcile) count these per record and move on.
    pub fn is_transient(&self) -> bool {
        matches!(self, ShareError::Io(_) | ShareError::Database(_))
    }
}

impl From<sqlx::Error> for ShareError {
    fn from(e: sqlx::Error) -> Self {
        ShareError::Database(e.to_string())
    }
}

/// Result type alias for sharebox operations.
pub type Result<T> = std::result::Result<T, ShareError>;
