// src/learner/consolidator.rs — Batch re-derivation of learned patterns
//
// Consolidation recomputes vendor and category patterns from confirmed events
// only. It overwrites whatever immediate learning left in the same row, so the
// stored state after a run depends on the event log alone.

use std::collections::HashMap;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::{Conditions, EventType, Outcome, PatternType, PostingAction};
use crate::infra::config::LearningConfig;
use crate::infra::errors::AgentError;
use crate::storage::store::{LearningEventRow, PatternWrite};
use crate::storage::StoreHandle;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsolidationReport {
    pub events_scanned: usize,
    pub vendor_patterns: usize,
    pub category_patterns: usize,
}

pub struct Consolidator {
    store: StoreHandle,
    config: LearningConfig,
}

impl Consolidator {
    pub fn new(store: StoreHandle, config: LearningConfig) -> Self {
        Self { store, config }
    }

    pub async fn consolidate(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ConsolidationReport, AgentError> {
        let events = self
            .store
            .query_events_by_outcome(tenant_id, Outcome::Confirmed.as_str(), cancel)
            .await?;

        let writes = derive_patterns(&events, &self.config);
        let report = ConsolidationReport {
            events_scanned: events.len(),
            vendor_patterns: count_type(&writes, PatternType::VendorAction),
            category_patterns: count_type(&writes, PatternType::CategoryAction),
        };

        if !writes.is_empty() {
            self.store.replace_patterns(tenant_id, writes, cancel).await?;
        }

        info!(
            tenant = tenant_id,
            events = report.events_scanned,
            vendor = report.vendor_patterns,
            category = report.category_patterns,
            "Consolidated learned patterns"
        );
        Ok(report)
    }
}

fn count_type(writes: &[PatternWrite], t: PatternType) -> usize {
    writes.iter().filter(|w| w.pattern_type == t.as_str()).count()
}

#[derive(Default)]
struct Tally {
    count: u32,
    /// Most recent spelling of the action (names may differ between events).
    action: Option<PostingAction>,
}

type Groups = HashMap<String, HashMap<(String, String), Tally>>;

/// Group confirmed events by (condition, action), keep the most supported
/// action per condition, and grade it with the count ladder.
pub fn derive_patterns(events: &[LearningEventRow], config: &LearningConfig) -> Vec<PatternWrite> {
    let mut vendor_groups: Groups = HashMap::new();
    let mut category_groups: Groups = HashMap::new();

    for event in events {
        if event.outcome != Outcome::Confirmed.as_str() {
            continue;
        }
        let Some(event_type) = EventType::parse(&event.event_type) else {
            continue;
        };
        let Some(action) = decode_action(event) else {
            continue;
        };
        if action.uses_any(&config.fallback_accounts) {
            continue;
        }
        let context: Value = match serde_json::from_str(&event.context) {
            Ok(v) => v,
            Err(e) => {
                debug!(event = %event.id, "Skipping event with unreadable context: {e}");
                continue;
            }
        };

        if event_type == EventType::DecisionCreated {
            if let Some(vendor) = context_str(&context, "vendorName") {
                tally(&mut vendor_groups, Conditions::vendor(vendor).to_key(), &action);
            }
        }
        if matches!(
            event_type,
            EventType::DecisionCreated | EventType::ChatSpecifiedOverride
        ) {
            if let Some(category) = context_str(&context, "category") {
                tally(&mut category_groups, Conditions::category(category).to_key(), &action);
            }
        }
    }

    let mut writes = Vec::new();
    writes.extend(grade(
        vendor_groups,
        PatternType::VendorAction,
        config.vendor_min_support,
        config.vendor_base_confidence,
        config,
    ));
    writes.extend(grade(
        category_groups,
        PatternType::CategoryAction,
        config.category_min_support,
        config.category_base_confidence,
        config,
    ));
    writes.sort_by(|a, b| {
        (a.pattern_type.as_str(), a.conditions.as_str())
            .cmp(&(b.pattern_type.as_str(), b.conditions.as_str()))
    });
    writes
}

fn decode_action(event: &LearningEventRow) -> Option<PostingAction> {
    let raw = event.decision_output.as_deref()?;
    let value: Value = serde_json::from_str(raw).ok()?;
    PostingAction::from_value(&value)
}

fn context_str<'a>(context: &'a Value, key: &str) -> Option<&'a str> {
    context[key].as_str().map(str::trim).filter(|s| !s.is_empty())
}

fn tally(groups: &mut Groups, condition: String, action: &PostingAction) {
    let entry = groups
        .entry(condition)
        .or_default()
        .entry(action.key())
        .or_default();
    entry.count += 1;
    entry.action = Some(action.clone());
}

fn grade(
    groups: Groups,
    pattern_type: PatternType,
    min_support: u32,
    base: f64,
    config: &LearningConfig,
) -> Vec<PatternWrite> {
    let mut out = Vec::new();
    for (condition, actions) in groups {
        // Highest count wins; ties go to the lowest (debit, credit) pair.
        let best = actions
            .into_iter()
            .filter_map(|(key, t)| t.action.map(|a| (key, t.count, a)))
            .max_by(|(ka, ca, _), (kb, cb, _)| ca.cmp(cb).then_with(|| kb.cmp(ka)));
        let Some((_, count, action)) = best else {
            continue;
        };
        if count < min_support {
            continue;
        }
        let Ok(recommendation) = serde_json::to_string(&action) else {
            continue;
        };
        out.push(PatternWrite {
            pattern_type: pattern_type.as_str().to_string(),
            conditions: condition,
            recommendation,
            confidence: config.ladder_confidence(count, base),
            sample_count: i64::from(count),
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(
        id: &str,
        event_type: &str,
        outcome: &str,
        context: &str,
        decision: Option<&str>,
    ) -> LearningEventRow {
        LearningEventRow {
            id: id.into(),
            tenant_id: "t1".into(),
            event_type: event_type.into(),
            session_id: None,
            skill_id: None,
            context: context.into(),
            decision_output: decision.map(str::to_string),
            user_action: None,
            outcome: outcome.into(),
            created_at: format!("2026-01-01T00:00:{id:0>2}.000000Z"),
            updated_at: String::new(),
        }
    }

    const ACME: &str = r#"{"vendorName":"Acme","category":"hosting"}"#;
    const HOSTING: &str = r#"{"debit":"6100","credit":"2100"}"#;
    const OTHER: &str = r#"{"debit":"6200","credit":"2100"}"#;

    #[test]
    fn test_vendor_needs_two_confirmations() {
        let cfg = LearningConfig::default();
        let one = vec![event("1", "decision_created", "confirmed", ACME, Some(HOSTING))];
        let writes = derive_patterns(&one, &cfg);
        assert_eq!(count_type(&writes, PatternType::VendorAction), 0);
        assert_eq!(count_type(&writes, PatternType::CategoryAction), 1);
        assert_eq!(writes[0].confidence, 0.65);
    }

    #[test]
    fn test_majority_action_and_ladder() {
        let cfg = LearningConfig::default();
        let mut events: Vec<_> = (0..5)
            .map(|i| event(&i.to_string(), "decision_created", "confirmed", ACME, Some(HOSTING)))
            .collect();
        events.push(event("8", "decision_created", "confirmed", ACME, Some(OTHER)));
        events.push(event("9", "decision_created", "pending_review", ACME, Some(OTHER)));

        let writes = derive_patterns(&events, &cfg);
        let vendor = writes
            .iter()
            .find(|w| w.pattern_type == "vendor_action")
            .unwrap();
        assert_eq!(vendor.conditions, r#"{"vendorName":"Acme"}"#);
        assert_eq!(vendor.sample_count, 5);
        assert_eq!(vendor.confidence, 0.85);
        assert!(vendor.recommendation.contains("6100"));
    }

    #[test]
    fn test_chat_override_feeds_category_only() {
        let cfg = LearningConfig::default();
        let events = vec![
            event("1", "chat_specified_override", "confirmed", ACME, Some(HOSTING)),
            event("2", "chat_specified_override", "confirmed", ACME, Some(HOSTING)),
        ];
        let writes = derive_patterns(&events, &cfg);
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].pattern_type, "category_action");
        assert_eq!(writes[0].sample_count, 2);
    }

    #[test]
    fn test_fallback_and_malformed_events_are_ignored() {
        let cfg = LearningConfig::default();
        let events = vec![
            event(
                "1",
                "decision_created",
                "confirmed",
                ACME,
                Some(r#"{"debit":"183","credit":"2100"}"#),
            ),
            event("2", "decision_created", "confirmed", "not json", Some(HOSTING)),
            event("3", "decision_created", "confirmed", ACME, None),
        ];
        assert!(derive_patterns(&events, &cfg).is_empty());
    }

    #[test]
    fn test_tie_breaks_on_lowest_action() {
        let cfg = LearningConfig::default();
        let events = vec![
            event("1", "decision_created", "confirmed", ACME, Some(OTHER)),
            event("2", "decision_created", "confirmed", ACME, Some(OTHER)),
            event("3", "decision_created", "confirmed", ACME, Some(HOSTING)),
            event("4", "decision_created", "confirmed", ACME, Some(HOSTING)),
        ];
        let first = derive_patterns(&events, &cfg);
        let mut reversed = events.clone();
        reversed.reverse();
        assert_eq!(first, derive_patterns(&reversed, &cfg));
        assert!(first[0].recommendation.contains("6100"));
    }
}
