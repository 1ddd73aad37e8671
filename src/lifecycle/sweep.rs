//! Expired-file sweeping.
//!
//! [`Sweeper`] performs one pass; [`SweepScheduler`] runs passes on a tokio
//! interval in the background.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{oneshot, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::file::{BlobStore, FileRecord, MetadataStore};
use crate::Result;

/// Default interval between sweep passes (1 hour).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Expired records found.
    pub examined: usize,
    /// Records whose blob and metadata were removed.
    pub deleted: usize,
    /// Records left for the next pass.
    pub failed: usize,
}

/// Removes expired files.
pub struct Sweeper {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
}

impl Sweeper {
    /// Create a new Sweeper.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            metadata,
            blobs,
            clock,
        }
    }

    /// Run one sweep pass.
    ///
    /// Only failing to list expired records fails the pass; each record is
    /// handled independently and a failure just leaves it for next time.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let expired = self.metadata.find_expired(now).await?;

        let mut report = SweepReport {
            examined: expired.len(),
            ..SweepReport::default()
        };

        for record in &expired {
            match self.remove(record).await {
                Ok(()) => report.deleted += 1,
                Err(e) => {
                    warn!(
                        file_id = %record.id,
                        path = %record.storage_path,
                        transient = e.is_transient(),
                        "Failed to sweep expired file: {}", e
                    );
                    report.failed += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                deleted = report.deleted,
                failed = report.failed,
                "Sweep pass complete"
            );
        } else {
            debug!("Sweep pass found no expired files");
        }

        Ok(report)
    }

    /// Blob first (absence is fine), then metadata.
    async fn remove(&self, record: &FileRecord) -> Result<()> {
        if !self.blobs.delete(&record.storage_path).await? {
            debug!(file_id = %record.id, "Expired file had no blob");
        }
        if !self.metadata.delete(record.id).await? {
            debug!(file_id = %record.id, "Expired record already removed");
        }
        Ok(())
    }

    /// Run one pass, logging instead of returning a failure.
    pub async fn run_logged(&self) -> SweepReport {
        match self.run_once().await {
            Ok(report) => report,
            Err(e) => {
                error!("Sweep pass failed: {}", e);
                SweepReport::default()
            }
        }
    }
}

/// Scheduler state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
}

/// Result of [`SweepScheduler::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    /// The scheduler started; carries the immediate pass's report.
    Started(SweepReport),
    /// The scheduler was already running; nothing changed.
    AlreadyRunning,
}

struct RunningSweep {
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Runs sweep passes periodically.
pub struct SweepScheduler {
    sweeper: Arc<Sweeper>,
    period: Duration,
    running: Mutex<Option<RunningSweep>>,
    reports: Arc<watch::Sender<SweepReport>>,
}

impl SweepScheduler {
    /// Create an idle scheduler running `sweeper` every `period`.
    pub fn new(sweeper: Arc<Sweeper>, period: Duration) -> Self {
        let (reports, _) = watch::channel(SweepReport::default());
        Self {
            sweeper,
            period,
            running: Mutex::new(None),
            reports: Arc::new(reports),
        }
    }

    /// The sweeper driven by this scheduler.
    pub fn sweeper(&self) -> &Arc<Sweeper> {
        &self.sweeper
    }

    /// Current state.
    pub async fn state(&self) -> SchedulerState {
        if self.running.lock().await.is_some() {
            SchedulerState::Running
        } else {
            SchedulerState::Idle
        }
    }

    /// Receive the report of every pass run by this scheduler.
    pub fn subscribe(&self) -> watch::Receiver<SweepReport> {
        self.reports.subscribe()
    }

    /// Run one pass now, independent of the timer.
    pub async fn run_once(&self) -> Result<SweepReport> {
        let report = self.sweeper.run_once().await?;
        self.reports.send_replace(report);
        Ok(report)
    }

    /// Idle -> Running: one immediate pass, then a pass every period.
    pub async fn start(&self) -> StartOutcome {
        let mut running = self.running.lock().await;
        if running.is_some() {
            debug!("Sweep scheduler already running");
            return StartOutcome::AlreadyRunning;
        }

        let initial = self.sweeper.run_logged().await;
        self.reports.send_replace(initial);

        let (shutdown, mut shutdown_rx) = oneshot::channel();
        let sweeper = self.sweeper.clone();
        let reports = self.reports.clone();
        let period = self.period;

        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval(period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first immediate tick
            timer.tick().await;

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = timer.tick() => {
                        let report = sweeper.run_logged().await;
                        reports.send_replace(report);
                    }
                }
            }
            debug!("Sweep loop exited");
        });

        *running = Some(RunningSweep { shutdown, handle });
        info!(
            "Sweep scheduler started (interval: {} seconds)",
            period.as_secs()
        );
        StartOutcome::Started(initial)
    }

    /// Running -> Idle. Returns `false` if the scheduler was idle.
    ///
    /// A pass in progress finishes before this returns.
    pub async fn stop(&self) -> bool {
        let Some(task) = self.running.lock().await.take() else {
            return false;
        };

        let _ = task.shutdown.send(());
        if let Err(e) = task.handle.await {
            warn!("Sweep loop ended abnormally: {}", e);
        }
        info!("Sweep scheduler stopped");
        true
    }
}

impl Drop for SweepScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.running.get_mut().take() {
            task.handle.abort();
        }
    }
}
