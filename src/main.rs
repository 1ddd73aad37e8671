use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use sharebox::lifecycle::StartOutcome;
use sharebox::web::{AppState, WebServer};
use sharebox::{
    Config, Database, FileService, FileServiceOptions, FileStorage, Reconciler, SweepScheduler,
    Sweeper, SystemClock,
};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = sharebox::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        sharebox::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("sharebox stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> sharebox::Result<()> {
    config.validate()?;

    info!("sharebox - expiring file sharing");

    let db = Database::open(&config.database.path).await?;
    let storage = Arc::new(FileStorage::new(&config.storage.path)?);
    info!(
        database = %config.database.path,
        storage = %config.storage.path,
        "Storage ready"
    );

    let clock = Arc::new(SystemClock);
    let service = Arc::new(FileService::with_database(
        &db,
        storage.clone(),
        clock.clone(),
        FileServiceOptions::from_config(&config),
    ));

    let reconciler = Arc::new(Reconciler::new(service.metadata(), storage.clone()));
    if config.lifecycle.reconcile_on_startup {
        match reconciler.reconcile_orphans().await {
            Ok(report) => info!(
                found = report.found,
                deleted = report.deleted,
                "Startup reconciliation complete"
            ),
            Err(e) => warn!("Startup reconciliation failed: {}", e),
        }
    }

    let sweeper = Arc::new(Sweeper::new(service.metadata(), storage, clock));
    let scheduler = Arc::new(SweepScheduler::new(
        sweeper,
        Duration::from_secs(config.lifecycle.sweep_interval_secs),
    ));
    if config.lifecycle.sweep_enabled {
        if let StartOutcome::Started(report) = scheduler.start().await {
            info!(
                interval_secs = config.lifecycle.sweep_interval_secs,
                deleted = report.deleted,
                "Sweep scheduler started"
            );
        }
    }

    if config.web.enabled {
        let app_state = Arc::new(AppState::new(service, scheduler.clone(), reconciler));
        let server = WebServer::new(&config.web, app_state)?;
        server.run(shutdown_signal()).await?;
    } else {
        info!("Web API disabled; running sweeps only");
        shutdown_signal().await;
    }

    scheduler.stop().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutdown signal received");
}
