//! sharebox - expiring file sharing
//!
//! Files are uploaded with an expiry horizon and a download cap. Downloads
//! are counted and logged, expired files are swept periodically, and blobs
//! that lost their metadata are reconciled away.

pub mod clock;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod lifecycle;
pub mod logging;
pub mod notify;
pub mod web;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository};
pub use error::{GoneReason, Result, ShareError};
pub use file::{
    BlobStore, FileRecord, FileStorage, MemoryBlobStore, MemoryMetadataStore, MetadataStore,
    RequesterInfo, SqliteMetadataStore,
};
pub use lifecycle::{
    FileService, FileServiceOptions, ReconcileReport, Reconciler, SweepReport, SweepScheduler,
    Sweeper, UploadRequest,
};
pub use notify::{LogNotifier, Notifier, ShareNotice};
