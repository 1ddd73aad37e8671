//! Expiring-file lifecycle for sharebox.
//!
//! This module governs a file from upload to deletion:
//! - Policy: expiry computation and availability checks
//! - Access recording on download
//! - The file service exposed to callers
//! - Periodic sweeping of expired files
//! - Reconciliation of orphan blobs

mod access;
pub mod policy;
mod reconcile;
mod service;
mod sweep;

pub use access::AccessRecorder;
pub use reconcile::{ReconcileReport, Reconciler};
pub use service::{DownloadResult, FileService, FileServiceOptions, OwnerFiles, UploadRequest};
pub use sweep::{
    SchedulerState, StartOutcome, SweepReport, SweepScheduler, Sweeper, DEFAULT_SWEEP_INTERVAL,
};

/// Shortest allowed expiry horizon in hours.
pub const MIN_EXPIRY_HOURS: i64 = 1;

/// Longest allowed expiry horizon in hours (one week).
pub const MAX_EXPIRY_HOURS: i64 = 168;

/// Expiry horizon used when none is given.
pub const DEFAULT_EXPIRY_HOURS: i64 = 24;

/// Download limit used when none is given.
pub const DEFAULT_MAX_DOWNLOADS: i64 = 100;
