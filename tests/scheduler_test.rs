// tests/scheduler_test.rs — Integration test: per-tenant isolation in the consolidation cycle

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use ledgerpilot::infra::config::{LearningConfig, SchedulerConfig};
use ledgerpilot::infra::daemon::{
    Alert, AlertSink, AnomalyCheck, ConsolidationScheduler, PendingReviewBacklogCheck, Severity,
};
use ledgerpilot::infra::errors::AgentError;
use ledgerpilot::learner::LearningCollector;
use ledgerpilot::storage::store::NewLearningEvent;
use ledgerpilot::storage::{spawn_store_server, StorageManager, StoreHandle};
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio_util::sync::CancellationToken;

/// Fails for one tenant, finds nothing elsewhere.
struct BrokenFor(&'static str);

#[async_trait]
impl AnomalyCheck for BrokenFor {
    fn name(&self) -> &str {
        "broken_for"
    }

    async fn run(
        &self,
        tenant_id: &str,
        _store: &StoreHandle,
        _now: DateTime<Utc>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<Alert>, AgentError> {
        if tenant_id == self.0 {
            return Err(AgentError::Config(format!("no ledger for {tenant_id}")));
        }
        Ok(Vec::new())
    }
}

#[derive(Default)]
struct RecordingSink {
    seen: Mutex<Vec<(String, Alert)>>,
}

#[async_trait]
impl AlertSink for RecordingSink {
    async fn dispatch(&self, tenant_id: &str, alerts: &[Alert]) -> Result<(), AgentError> {
        let mut seen = self.seen.lock().unwrap();
        for alert in alerts {
            seen.push((tenant_id.to_string(), alert.clone()));
        }
        Ok(())
    }
}

async fn seed(store: &StoreHandle, cancel: &CancellationToken) {
    for tenant in ["acme", "broken", "globex"] {
        store.insert_tenant(tenant, None, "active", cancel).await.unwrap();
    }
    store.insert_tenant("gone", None, "suspended", cancel).await.unwrap();

    let collector = LearningCollector::new(store.clone(), LearningConfig::default());
    for tenant in ["acme", "broken", "globex"] {
        for _ in 0..2 {
            collector
                .record_decision(
                    tenant,
                    None,
                    None,
                    &json!({ "vendorName": "Acme Hosting" }),
                    &json!({ "debit": "6100", "credit": "2100" }),
                    cancel,
                )
                .await
                .unwrap();
        }
        collector
            .confirm_decision(tenant, "vendorName", "Acme Hosting", cancel)
            .await
            .unwrap();
    }

    // A decision nobody looked at for three weeks.
    store
        .insert_learning_event(
            NewLearningEvent {
                id: "stale-1".into(),
                tenant_id: "globex".into(),
                event_type: "decision_created".into(),
                session_id: None,
                skill_id: None,
                context: r#"{"vendorName":"Initech"}"#.into(),
                decision_output: Some(r#"{"debit":"6300","credit":"2100"}"#.into()),
                user_action: None,
                outcome: "pending_review".into(),
                created_at: Utc::now() - Duration::days(21),
            },
            cancel,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_one_failing_tenant_does_not_stop_the_cycle() {
    let store = StorageManager::in_memory().unwrap().spawn(16);
    let cancel = CancellationToken::new();
    seed(&store, &cancel).await;

    let sink = Arc::new(RecordingSink::default());
    let scheduler = ConsolidationScheduler::new(
        store.clone(),
        LearningConfig::default(),
        SchedulerConfig::default(),
    )
    .with_checks(vec![
        Arc::new(BrokenFor("broken")),
        Arc::new(PendingReviewBacklogCheck::default()),
    ])
    .with_sink(sink.clone());

    let report = scheduler.run_once(&cancel).await;
    assert!(!report.skipped);
    assert_eq!(report.tenants, 3);
    assert_eq!(report.failed, vec!["broken".to_string()]);
    let done: Vec<&str> = report.consolidated.iter().map(|(t, _)| t.as_str()).collect();
    assert_eq!(done, vec!["acme", "globex"]);
    assert_eq!(report.alerts, 1);

    assert_eq!(store.query_all_patterns("acme", &cancel).await.unwrap().len(), 1);
    assert_eq!(store.query_all_patterns("globex", &cancel).await.unwrap().len(), 1);
    assert!(store.query_all_patterns("broken", &cancel).await.unwrap().is_empty());

    let seen = sink.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "globex");
    assert_eq!(seen[0].1.alert_type, "pending_review_backlog");
    assert_eq!(seen[0].1.severity, Severity::Warning);
}

#[tokio::test]
async fn test_unlisted_tenants_skip_the_cycle() {
    let storage = StorageManager::in_memory().unwrap();
    let (store, join) = spawn_store_server(storage.store, 1);
    join.abort();
    let _ = join.await;

    let scheduler =
        ConsolidationScheduler::new(store, LearningConfig::default(), SchedulerConfig::default());
    let report = scheduler.run_once(&CancellationToken::new()).await;
    assert!(report.skipped);
    assert!(report.consolidated.is_empty());
}

#[tokio::test]
async fn test_shutdown_during_startup_delay() {
    let store = StorageManager::in_memory().unwrap().spawn(4);
    let scheduler = ConsolidationScheduler::new(
        store,
        LearningConfig::default(),
        SchedulerConfig {
            enabled: true,
            interval_hours: 24,
            startup_delay_secs: 3600,
        },
    );
    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(scheduler.run(shutdown.clone()));
    shutdown.cancel();
    tokio::time::timeout(StdDuration::from_secs(5), worker)
        .await
        .expect("scheduler should stop promptly")
        .unwrap();
}
