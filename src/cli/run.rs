// src/cli/run.rs — Long-running scheduler and one-shot consolidation

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infra::config::Config;
use crate::infra::daemon::ConsolidationScheduler;
use crate::storage::{StorageManager, StoreHandle};

fn open_store(config: &Config) -> anyhow::Result<StoreHandle> {
    let path = config.storage.db_path();
    let storage = StorageManager::open(&path)?;
    info!(path = %path.display(), "Opened database");
    Ok(storage.spawn(config.storage.channel_capacity))
}

/// Run the consolidation scheduler until Ctrl-C.
pub async fn run_service(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let scheduler =
        ConsolidationScheduler::new(store, config.learning.clone(), config.scheduler.clone());

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(scheduler.run(shutdown.clone()));

    println!("LedgerPilot running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    shutdown.cancel();

    if let Err(e) = worker.await {
        warn!("Scheduler task ended abnormally: {e}");
    }
    Ok(())
}

/// Run checks and consolidation once for a single tenant.
pub async fn run_consolidate(config: &Config, tenant: &str) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let scheduler =
        ConsolidationScheduler::new(store, config.learning.clone(), config.scheduler.clone());
    let (alerts, report) = scheduler
        .process_tenant(tenant, &CancellationToken::new())
        .await?;
    println!(
        "{tenant}: {} events scanned, {} vendor / {} category patterns, {alerts} alert(s)",
        report.events_scanned, report.vendor_patterns, report.category_patterns
    );
    Ok(())
}
