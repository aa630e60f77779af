// src/patterns/miner.rs — Read-only aggregation over historical transactions
//
// Every query here is advisory: failures are logged and yield an empty result.

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::infra::errors::AgentError;
use crate::learner::types::PostingAction;
use crate::storage::store::{ActionUsageRow, BookingTemplateRow, SimilarTransactionRow};
use crate::storage::StoreHandle;

const VENDOR_USAGE_LIMIT: u32 = 8;
const VENDOR_TEMPLATE_WINDOW: u32 = 30;
const CATEGORY_TEMPLATE_WINDOW: u32 = 50;
const TEMPLATE_TOP_K: u32 = 5;
const AMOUNT_TOLERANCE: f64 = 0.20;

/// An action used on past transactions for a vendor, with how often.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionUsage {
    pub action_code: String,
    pub action_name: Option<String>,
    pub side: String,
    pub usage_count: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarTransaction {
    pub document_no: String,
    pub summary: Option<String>,
    pub amount: f64,
    pub posting_date: String,
    pub debit_action: Option<String>,
    pub credit_action: Option<String>,
}

/// A (primary debit, primary credit) pair seen repeatedly, with its usage count.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingTemplate {
    pub action: PostingAction,
    pub summary: Option<String>,
    pub usage_count: i64,
}

impl From<ActionUsageRow> for ActionUsage {
    fn from(row: ActionUsageRow) -> Self {
        Self {
            action_code: row.action_code,
            action_name: row.action_name,
            side: row.side,
            usage_count: row.usage_count,
        }
    }
}

impl From<SimilarTransactionRow> for SimilarTransaction {
    fn from(row: SimilarTransactionRow) -> Self {
        Self {
            document_no: row.document_no,
            summary: row.summary,
            amount: row.amount,
            posting_date: row.posting_date,
            debit_action: row.debit_action,
            credit_action: row.credit_action,
        }
    }
}

impl From<BookingTemplateRow> for BookingTemplate {
    fn from(row: BookingTemplateRow) -> Self {
        Self {
            action: PostingAction {
                debit: row.debit_action,
                debit_name: row.debit_name,
                credit: row.credit_action,
                credit_name: row.credit_name,
            },
            summary: row.summary,
            usage_count: row.usage_count,
        }
    }
}

/// Mines booking habits out of a tenant's transaction history.
#[derive(Clone)]
pub struct HistoryMiner {
    store: StoreHandle,
}

impl HistoryMiner {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Actions used on completed transactions mentioning `vendor`, most used first.
    pub async fn vendor_action_usage(
        &self,
        tenant_id: &str,
        vendor: &str,
        cancel: &CancellationToken,
    ) -> Vec<ActionUsage> {
        let vendor = vendor.trim();
        if vendor.is_empty() {
            return Vec::new();
        }
        let rows = self
            .store
            .query_vendor_action_usage(tenant_id, vendor, VENDOR_USAGE_LIMIT, cancel)
            .await;
        advisory("vendor action usage", tenant_id, rows)
    }

    /// Most recent transactions with a line amount within ±20% of `amount`.
    pub async fn similar_amounts(
        &self,
        tenant_id: &str,
        amount: f64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Vec<SimilarTransaction> {
        let amount = amount.abs();
        if amount == 0.0 || !amount.is_finite() {
            return Vec::new();
        }
        let (lower, upper) = amount_window(amount);
        let rows = self
            .store
            .query_similar_transactions(tenant_id, lower, upper, limit, cancel)
            .await;
        advisory("similar amounts", tenant_id, rows)
    }

    /// Top booking templates among the 30 newest transactions mentioning `vendor`.
    pub async fn vendor_booking_templates(
        &self,
        tenant_id: &str,
        vendor: &str,
        cancel: &CancellationToken,
    ) -> Vec<BookingTemplate> {
        let vendor = vendor.trim();
        if vendor.is_empty() {
            return Vec::new();
        }
        let rows = self
            .store
            .query_vendor_booking_templates(
                tenant_id,
                vendor,
                VENDOR_TEMPLATE_WINDOW,
                TEMPLATE_TOP_K,
                cancel,
            )
            .await;
        advisory("vendor booking templates", tenant_id, rows)
    }

    /// Top booking templates among the 50 newest transactions matching an expense keyword.
    pub async fn category_booking_templates(
        &self,
        tenant_id: &str,
        keyword: &str,
        cancel: &CancellationToken,
    ) -> Vec<BookingTemplate> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Vec::new();
        }
        let rows = self
            .store
            .query_category_booking_templates(
                tenant_id,
                keyword,
                CATEGORY_TEMPLATE_WINDOW,
                TEMPLATE_TOP_K,
                cancel,
            )
            .await;
        advisory("category booking templates", tenant_id, rows)
    }
}

fn amount_window(amount: f64) -> (f64, f64) {
    (amount * (1.0 - AMOUNT_TOLERANCE), amount * (1.0 + AMOUNT_TOLERANCE))
}

fn advisory<R, T: From<R>>(
    what: &str,
    tenant_id: &str,
    rows: Result<Vec<R>, AgentError>,
) -> Vec<T> {
    match rows {
        Ok(rows) => rows.into_iter().map(T::from).collect(),
        Err(e) => {
            warn!(tenant = tenant_id, "History query '{what}' failed: {e}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::{TransactionLine, TransactionRecord};
    use crate::storage::StorageManager;
    use chrono::{Duration, Utc};

    fn record(
        id: &str,
        summary: &str,
        memo: Option<&str>,
        dr: &str,
        amount: f64,
        mins_ago: i64,
    ) -> TransactionRecord {
        TransactionRecord {
            id: id.into(),
            tenant_id: "t1".into(),
            document_no: format!("D{id}"),
            partner_name: None,
            summary: Some(summary.into()),
            posting_date: "2026-02-01".into(),
            status: "completed".into(),
            created_at: Utc::now() - Duration::minutes(mins_ago),
            lines: vec![
                TransactionLine {
                    side: "DR".into(),
                    action_code: dr.into(),
                    action_name: Some("Travel".into()),
                    amount,
                    memo: memo.map(str::to_string),
                },
                TransactionLine {
                    side: "CR".into(),
                    action_code: "2100".into(),
                    action_name: Some("Payables".into()),
                    amount,
                    memo: None,
                },
            ],
        }
    }

    #[test]
    fn test_amount_window() {
        let (lo, hi) = amount_window(1000.0);
        assert!((lo - 800.0).abs() < 1e-9);
        assert!((hi - 1200.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_memo_match_counts_for_vendor() {
        let storage = StorageManager::in_memory().unwrap();
        storage
            .store
            .insert_transaction(&record(
                "1",
                "Monthly",
                Some("paid to Skyline Air"),
                "6400",
                500.0,
                5,
            ))
            .unwrap();
        let miner = HistoryMiner::new(storage.spawn(8));
        let cancel = CancellationToken::new();

        let usage = miner.vendor_action_usage("t1", "skyline", &cancel).await;
        assert_eq!(usage.len(), 2);
        assert!(miner.vendor_action_usage("t1", "   ", &cancel).await.is_empty());
        assert!(miner.similar_amounts("t1", 0.0, 3, &cancel).await.is_empty());
    }

    #[tokio::test]
    async fn test_category_templates_carry_names() {
        let storage = StorageManager::in_memory().unwrap();
        for i in 0..3 {
            storage
                .store
                .insert_transaction(&record(&i.to_string(), "Taxi", None, "6400", 30.0, i))
                .unwrap();
        }
        let miner = HistoryMiner::new(storage.spawn(8));
        let templates = miner
            .category_booking_templates("t1", "travel", &CancellationToken::new())
            .await;
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].usage_count, 3);
        assert_eq!(templates[0].action.debit_name.as_deref(), Some("Travel"));
    }

    #[tokio::test]
    async fn test_failures_become_empty() {
        let miner = HistoryMiner::new(StorageManager::in_memory().unwrap().spawn(8));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(miner.vendor_booking_templates("t1", "acme", &cancel).await.is_empty());
    }
}
