// src/infra/daemon/mod.rs — Background consolidation scheduler
//
// One long-lived task. After a startup delay it runs a cycle on a fixed
// interval: for every active tenant, anomaly checks then consolidation.
// Cycles never overlap because the loop awaits each one before ticking again.

pub mod checks;

pub use checks::{
    Alert, AlertSink, AmountDeviationCheck, AnomalyCheck, LogAlertSink, PendingReviewBacklogCheck,
    Severity,
};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::config::{LearningConfig, SchedulerConfig};
use crate::infra::errors::AgentError;
use crate::learner::{ConsolidationReport, Consolidator};
use crate::storage::StoreHandle;

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub tenants: usize,
    pub consolidated: Vec<(String, ConsolidationReport)>,
    pub failed: Vec<String>,
    pub alerts: usize,
    /// Tenants could not be listed; nothing ran.
    pub skipped: bool,
}

pub struct ConsolidationScheduler {
    store: StoreHandle,
    consolidator: Consolidator,
    checks: Vec<Arc<dyn AnomalyCheck>>,
    sink: Arc<dyn AlertSink>,
    config: SchedulerConfig,
}

impl ConsolidationScheduler {
    pub fn new(store: StoreHandle, learning: LearningConfig, config: SchedulerConfig) -> Self {
        Self {
            consolidator: Consolidator::new(store.clone(), learning),
            store,
            checks: vec![
                Arc::new(AmountDeviationCheck::default()),
                Arc::new(PendingReviewBacklogCheck::default()),
            ],
            sink: Arc::new(LogAlertSink),
            config,
        }
    }

    pub fn with_checks(mut self, checks: Vec<Arc<dyn AnomalyCheck>>) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        if !self.config.enabled {
            info!("Consolidation scheduler disabled");
            return;
        }

        let delay = Duration::from_secs(self.config.startup_delay_secs);
        let period = Duration::from_secs(self.config.interval_hours.max(1) * 3600);
        info!(
            delay_secs = delay.as_secs(),
            interval_hours = self.config.interval_hours,
            "Consolidation scheduler started"
        );

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Consolidation scheduler stopped before first cycle");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.run_once(&shutdown).await;
                }
            }
        }
        info!("Consolidation scheduler stopped");
    }

    /// One cycle over every active tenant.
    pub async fn run_once(&self, cancel: &CancellationToken) -> CycleReport {
        let mut report = CycleReport::default();
        let tenants = match self.store.list_active_tenants(cancel).await {
            Ok(t) => t,
            Err(e) => {
                warn!("Skipping consolidation cycle, cannot list tenants: {e}");
                report.skipped = true;
                return report;
            }
        };
        report.tenants = tenants.len();
        info!(tenants = tenants.len(), "Consolidation cycle starting");

        for tenant in tenants {
            if cancel.is_cancelled() {
                break;
            }
            match self.process_tenant(&tenant, cancel).await {
                Ok((alerts, consolidated)) => {
                    report.alerts += alerts;
                    report.consolidated.push((tenant, consolidated));
                }
                Err(e) => {
                    warn!(tenant = %tenant, "Tenant consolidation failed: {e}");
                    report.failed.push(tenant);
                }
            }
        }

        info!(
            consolidated = report.consolidated.len(),
            failed = report.failed.len(),
            alerts = report.alerts,
            "Consolidation cycle finished"
        );
        report
    }

    /// Checks, alert dispatch, then consolidation for one tenant.
    pub async fn process_tenant(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<(usize, ConsolidationReport), AgentError> {
        let now = Utc::now();
        let mut alerts = Vec::new();
        for check in &self.checks {
            let found = check.run(tenant_id, &self.store, now, cancel).await?;
            debug!(
                tenant = tenant_id,
                check = check.name(),
                alerts = found.len(),
                "Check finished"
            );
            alerts.extend(found);
        }
        if !alerts.is_empty() {
            if let Err(e) = self.sink.dispatch(tenant_id, &alerts).await {
                warn!(tenant = tenant_id, "Alert dispatch failed: {e}");
            }
        }

        let report = self.consolidator.consolidate(tenant_id, cancel).await?;
        Ok((alerts.len(), report))
    }
}
