//! HTTP API for sharebox.
//!
//! Exposes upload, download, metadata, deletion and sharing of files, plus
//! admin endpoints for sweeps and orphan reconciliation.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
