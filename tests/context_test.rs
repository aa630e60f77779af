// tests/context_test.rs — Integration test: confidence bands from mined and learned history

use chrono::{Duration, Utc};
use ledgerpilot::context::{ConfidenceBand, ContextBuilder, InputFields};
use ledgerpilot::infra::config::{ContextConfig, LearningConfig};
use ledgerpilot::learner::{Conditions, LearningCollector, PatternType, PostingAction};
use ledgerpilot::patterns::HistoryMiner;
use ledgerpilot::storage::store::{TransactionLine, TransactionRecord};
use ledgerpilot::storage::{StorageManager, StoreHandle};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

fn line(side: &str, code: &str, amount: f64) -> TransactionLine {
    TransactionLine {
        side: side.into(),
        action_code: code.into(),
        action_name: None,
        amount,
        memo: None,
    }
}

async fn book(store: &StoreHandle, n: usize, summary: &str, dr: &str, cr: &str, amount: f64) {
    let record = TransactionRecord {
        id: format!("tx-{n}"),
        tenant_id: "acme".into(),
        document_no: format!("20260000{n:02}"),
        partner_name: None,
        summary: Some(summary.into()),
        posting_date: "2026-09-01".into(),
        status: "completed".into(),
        created_at: Utc::now() - Duration::days(n as i64),
        lines: vec![line("DR", dr, amount), line("CR", cr, amount)],
    };
    store
        .insert_transaction(record, &CancellationToken::new())
        .await
        .unwrap();
}

async fn seeded() -> (StoreHandle, ContextBuilder) {
    let store = StorageManager::in_memory().unwrap().spawn(16);
    for n in 1..=4 {
        book(&store, n, "Acme Hosting monthly server", "6100", "2100", 1000.0).await;
    }
    book(&store, 5, "Globex supplies", "6200", "2100", 40.0).await;
    book(&store, 6, "Globex repair", "6500", "2100", 55.0).await;

    let builder = ContextBuilder::new(
        HistoryMiner::new(store.clone()),
        LearningCollector::new(store.clone(), LearningConfig::default()),
        ContextConfig::default(),
    );
    (store, builder)
}

fn input(vendor: Option<&str>, amount: Option<f64>) -> InputFields {
    InputFields {
        vendor: vendor.map(str::to_string),
        amount,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_bands_follow_history_depth() {
    let (_store, builder) = seeded().await;
    let cancel = CancellationToken::new();

    // Dominant template + similar amount + both key fields.
    let high = builder
        .build("acme", &input(Some("Acme Hosting"), Some(1000.0)), &cancel)
        .await;
    assert!((high.confidence - 0.90).abs() < 1e-9, "{}", high.confidence);
    assert_eq!(high.band, ConfidenceBand::High);
    assert_eq!(high.directive(), "act-autonomously");
    assert_eq!(high.recommendation.as_ref().unwrap().debit, "6100");
    assert!(high.hints.contains("used 4 times"));

    let medium_high = builder
        .build("acme", &input(Some("Acme Hosting"), None), &cancel)
        .await;
    assert!((medium_high.confidence - 0.75).abs() < 1e-9);
    assert_eq!(medium_high.directive(), "act-with-one-click-confirm");

    let medium = builder
        .build("acme", &input(Some("Globex"), None), &cancel)
        .await;
    assert!((medium.confidence - 0.60).abs() < 1e-9);
    assert_eq!(medium.band, ConfidenceBand::Medium);
    assert_eq!(medium.directive(), "ask-one-consolidated-question");

    let low = builder.build("acme", &InputFields::default(), &cancel).await;
    assert!((low.confidence - 0.30).abs() < 1e-9);
    assert_eq!(low.band, ConfidenceBand::Low);
    assert_eq!(low.directive(), "ask-one-consolidated-question");
    assert!(low.hints.is_empty());
    assert!(low.recommendation.is_none());
}

#[tokio::test]
async fn test_learned_vendor_pattern_adds_weighted_confidence() {
    let (store, builder) = seeded().await;
    let cancel = CancellationToken::new();
    LearningCollector::new(store, LearningConfig::default())
        .upsert_pattern(
            "acme",
            PatternType::VendorAction,
            &Conditions::vendor("Initech"),
            &PostingAction::new("6300", "2100"),
            &cancel,
        )
        .await
        .unwrap();

    let ctx = builder
        .build("acme", &input(Some("Initech KK"), None), &cancel)
        .await;
    assert!((ctx.confidence - 0.44).abs() < 1e-9, "{}", ctx.confidence);
    assert_eq!(ctx.band, ConfidenceBand::Low);
    assert_eq!(ctx.recommendation.unwrap().debit, "6300");
    assert!(ctx.hints.contains("Learned: vendor"));
}

#[tokio::test]
async fn test_rendered_guidance_carries_directive() {
    let (_store, builder) = seeded().await;
    let ctx = builder
        .build(
            "acme",
            &input(Some("Acme Hosting"), Some(1000.0)),
            &CancellationToken::new(),
        )
        .await;
    let text = ctx.render().unwrap();
    assert!(text.contains("(high, act-autonomously)"));
    assert!(text.contains("Recommended action: DR 6100 / CR 2100"));
}
