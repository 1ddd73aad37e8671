//! Admin handlers for maintenance operations.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::lifecycle::{ReconcileReport, SchedulerState, StartOutcome, SweepReport};
use crate::web::dto::{ApiResponse, SchedulerStatusResponse};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;
use crate::web::middleware::AdminUser;

/// POST /api/admin/sweep - Delete expired files now.
pub async fn run_sweep(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
) -> Result<Json<ApiResponse<SweepReport>>, ApiError> {
    tracing::info!(admin = %claims.username, "Manual sweep requested");
    let report = state.scheduler.run_once().await?;
    Ok(Json(ApiResponse::new(report)))
}

/// POST /api/admin/reconcile - Remove blobs with no metadata record.
pub async fn run_reconcile(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
) -> Result<Json<ApiResponse<ReconcileReport>>, ApiError> {
    tracing::info!(admin = %claims.username, "Manual reconcile requested");
    let report = state.reconciler.reconcile_orphans().await?;
    Ok(Json(ApiResponse::new(report)))
}

/// GET /api/admin/scheduler - Sweep scheduler state.
pub async fn scheduler_status(
    State(state): State<Arc<AppState>>,
    AdminUser(_): AdminUser,
) -> Json<ApiResponse<SchedulerStatusResponse>> {
    let running = state.scheduler.state().await == SchedulerState::Running;
    Json(ApiResponse::new(SchedulerStatusResponse { running }))
}

/// POST /api/admin/scheduler/start - Start periodic sweeps.
///
/// Starting an already running scheduler is a no-op.
pub async fn start_scheduler(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
) -> Json<ApiResponse<SchedulerStatusResponse>> {
    match state.scheduler.start().await {
        StartOutcome::Started(report) => {
            tracing::info!(
                admin = %claims.username,
                deleted = report.deleted,
                "Sweep scheduler started"
            );
        }
        StartOutcome::AlreadyRunning => {
            tracing::debug!("Sweep scheduler start requested while running");
        }
    }
    Json(ApiResponse::new(SchedulerStatusResponse { running: true }))
}

/// POST /api/admin/scheduler/stop - Stop periodic sweeps.
pub async fn stop_scheduler(
    State(state): State<Arc<AppState>>,
    AdminUser(claims): AdminUser,
) -> Json<ApiResponse<SchedulerStatusResponse>> {
    if state.scheduler.stop().await {
        tracing::info!(admin = %claims.username, "Sweep scheduler stopped");
    }
    Json(ApiResponse::new(SchedulerStatusResponse { running: false }))
}
