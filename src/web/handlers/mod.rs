//! API handlers.

pub mod admin;
pub mod file;

use std::sync::Arc;

use crate::lifecycle::{FileService, Reconciler, SweepScheduler};

pub use admin::*;
pub use file::*;

/// Shared state for every handler.
pub struct AppState {
    /// File lifecycle operations.
    pub service: Arc<FileService>,
    /// Periodic expiry sweeps.
    pub scheduler: Arc<SweepScheduler>,
    /// Orphan blob cleanup.
    pub reconciler: Arc<Reconciler>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        service: Arc<FileService>,
        scheduler: Arc<SweepScheduler>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            service,
            scheduler,
            reconciler,
        }
    }
}
