// src/infra/daemon/checks.rs — Per-tenant anomaly checks and where their alerts go

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::infra::errors::AgentError;
use crate::storage::store::{parse_ts, PartnerAmountRow};
use crate::storage::StoreHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub alert_type: String,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub data: serde_json::Value,
}

#[async_trait]
pub trait AnomalyCheck: Send + Sync {
    fn name(&self) -> &str;

    async fn run(
        &self,
        tenant_id: &str,
        store: &StoreHandle,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Alert>, AgentError>;
}

/// Where alerts end up (chat push, email, ...).
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn dispatch(&self, tenant_id: &str, alerts: &[Alert]) -> Result<(), AgentError>;
}

/// Writes alerts to the log.
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn dispatch(&self, tenant_id: &str, alerts: &[Alert]) -> Result<(), AgentError> {
        for alert in alerts {
            match alert.severity {
                Severity::Info => info!(
                    tenant = tenant_id,
                    alert = %alert.alert_type,
                    "{}: {}", alert.title, alert.message
                ),
                Severity::Warning | Severity::Critical => warn!(
                    tenant = tenant_id,
                    alert = %alert.alert_type,
                    severity = ?alert.severity,
                    "{}: {}", alert.title, alert.message
                ),
            }
        }
        Ok(())
    }
}

/// Recent transactions whose amount strays from the partner's usual amount.
pub struct AmountDeviationCheck {
    pub lookback_days: i64,
    pub recent_days: i64,
    pub min_samples: usize,
    /// Relative deviation that raises a warning.
    pub warn_ratio: f64,
    /// Relative deviation that raises a critical alert.
    pub critical_ratio: f64,
}

impl Default for AmountDeviationCheck {
    fn default() -> Self {
        Self {
            lookback_days: 180,
            recent_days: 7,
            min_samples: 3,
            warn_ratio: 0.5,
            critical_ratio: 1.0,
        }
    }
}

impl AmountDeviationCheck {
    /// Compare each recent row against the average of the partner's other rows.
    pub fn evaluate(&self, rows: &[PartnerAmountRow], now: DateTime<Utc>) -> Vec<Alert> {
        let mut by_partner: HashMap<&str, Vec<&PartnerAmountRow>> = HashMap::new();
        for row in rows {
            by_partner
                .entry(row.partner_name.as_str())
                .or_default()
                .push(row);
        }

        let recent_cutoff = now - Duration::days(self.recent_days);
        let mut alerts = Vec::new();
        for row in rows {
            if parse_ts(&row.created_at) < recent_cutoff {
                continue;
            }
            let baseline: Vec<f64> = by_partner
                .get(row.partner_name.as_str())
                .map(|peers| {
                    peers
                        .iter()
                        .filter(|p| p.transaction_id != row.transaction_id)
                        .map(|p| p.amount)
                        .collect()
                })
                .unwrap_or_default();
            if baseline.len() < self.min_samples {
                continue;
            }
            let avg = baseline.iter().sum::<f64>() / baseline.len() as f64;
            if avg <= 0.0 {
                continue;
            }
            let deviation = (row.amount - avg).abs() / avg;
            if deviation <= self.warn_ratio {
                continue;
            }
            let severity = if deviation > self.critical_ratio {
                Severity::Critical
            } else {
                Severity::Warning
            };
            alerts.push(Alert {
                alert_type: "amount_deviation".into(),
                severity,
                title: format!("Unusual amount for {}", row.partner_name),
                message: format!(
                    "{} is {:.2}, {:.0}% away from the usual {:.2}",
                    row.document_no,
                    row.amount,
                    deviation * 100.0,
                    avg
                ),
                data: json!({
                    "transactionId": row.transaction_id,
                    "documentNo": row.document_no,
                    "partnerName": row.partner_name,
                    "amount": row.amount,
                    "average": avg,
                    "samples": baseline.len(),
                }),
            });
        }
        alerts
    }
}

#[async_trait]
impl AnomalyCheck for AmountDeviationCheck {
    fn name(&self) -> &str {
        "amount_deviation"
    }

    async fn run(
        &self,
        tenant_id: &str,
        store: &StoreHandle,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Alert>, AgentError> {
        let since = now - Duration::days(self.lookback_days);
        let rows = store.query_partner_amounts(tenant_id, since, cancel).await?;
        Ok(self.evaluate(&rows, now))
    }
}

/// Agent decisions nobody has reviewed for too long.
pub struct PendingReviewBacklogCheck {
    pub max_age_days: i64,
}

impl Default for PendingReviewBacklogCheck {
    fn default() -> Self {
        Self { max_age_days: 14 }
    }
}

#[async_trait]
impl AnomalyCheck for PendingReviewBacklogCheck {
    fn name(&self) -> &str {
        "pending_review_backlog"
    }

    async fn run(
        &self,
        tenant_id: &str,
        store: &StoreHandle,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Alert>, AgentError> {
        let before = now - Duration::days(self.max_age_days);
        let count = store
            .count_pending_events_before(tenant_id, before, cancel)
            .await?;
        if count == 0 {
            return Ok(Vec::new());
        }
        Ok(vec![Alert {
            alert_type: "pending_review_backlog".into(),
            severity: Severity::Warning,
            title: "Decisions awaiting review".into(),
            message: format!(
                "{count} agent decisions have been pending review for more than {} days",
                self.max_age_days
            ),
            data: json!({ "count": count, "maxAgeDays": self.max_age_days }),
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::store::ts;

    fn row(id: &str, partner: &str, amount: f64, at: DateTime<Utc>) -> PartnerAmountRow {
        PartnerAmountRow {
            transaction_id: id.into(),
            document_no: format!("DOC-{id}"),
            partner_name: partner.into(),
            amount,
            created_at: ts(at),
        }
    }

    #[test]
    fn test_deviation_severity() {
        let now = Utc::now();
        let old = now - Duration::days(30);
        let rows = vec![
            row("new-1", "Acme", 250.0, now - Duration::days(1)),
            row("new-2", "Acme", 160.0, now - Duration::days(2)),
            row("new-3", "Acme", 110.0, now - Duration::days(3)),
            row("a", "Acme", 100.0, old),
            row("b", "Acme", 100.0, old),
            row("c", "Acme", 100.0, old),
        ];
        let check = AmountDeviationCheck {
            min_samples: 3,
            ..Default::default()
        };
        let alerts = check.evaluate(&rows, now);
        let by_id: HashMap<String, Severity> = alerts
            .iter()
            .map(|a| (a.data["transactionId"].as_str().unwrap().to_string(), a.severity))
            .collect();
        // new-1 vs avg(160,110,100,100,100)=114 -> ~119%
        assert_eq!(by_id.get("new-1"), Some(&Severity::Critical));
        // new-2 vs avg(250,110,100,100,100)=132 -> ~21%
        assert!(!by_id.contains_key("new-2"));
        assert!(!by_id.contains_key("a"));
    }

    #[test]
    fn test_too_few_samples_is_silent() {
        let now = Utc::now();
        let rows = vec![
            row("n", "Solo", 900.0, now),
            row("o", "Solo", 100.0, now - Duration::days(40)),
        ];
        assert!(AmountDeviationCheck::default().evaluate(&rows, now).is_empty());
    }
}
