// src/learner/collector.rs — Learning event log + immediate pattern learning

use chrono::Utc;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use super::normalize::normalize_description;
use super::types::{Conditions, EventType, LearnedPattern, Outcome, PatternType, PostingAction};
use crate::infra::config::LearningConfig;
use crate::infra::errors::AgentError;
use crate::storage::store::NewLearningEvent;
use crate::storage::StoreHandle;

const PATTERN_MIN_CONFIDENCE: f64 = 0.5;
const PATTERN_QUERY_LIMIT: u32 = 20;

/// An action the user spelled out in conversation ("book this under travel").
#[derive(Debug, Clone, Default)]
pub struct ChatSpecification {
    pub category: Option<String>,
    pub vendor: Option<String>,
    pub summary: Option<String>,
    pub action: Option<PostingAction>,
}

/// Appends learning events and applies the immediate-learning upsert.
#[derive(Clone)]
pub struct LearningCollector {
    store: StoreHandle,
    config: LearningConfig,
}

impl LearningCollector {
    pub fn new(store: StoreHandle, config: LearningConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }

    #[allow(clippy::too_many_arguments)]
    async fn append(
        &self,
        tenant_id: &str,
        event_type: EventType,
        session_id: Option<&str>,
        skill_id: Option<&str>,
        context: &Value,
        decision_output: Option<&Value>,
        user_action: Option<&Value>,
        outcome: Outcome,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let id = Uuid::new_v4().to_string();
        let event = NewLearningEvent {
            id: id.clone(),
            tenant_id: tenant_id.to_string(),
            event_type: event_type.as_str().to_string(),
            session_id: session_id.map(str::to_string),
            skill_id: skill_id.map(str::to_string),
            context: serde_json::to_string(context)?,
            decision_output: decision_output.map(serde_json::to_string).transpose()?,
            user_action: user_action.map(serde_json::to_string).transpose()?,
            outcome: outcome.as_str().to_string(),
            created_at: Utc::now(),
        };
        self.store.insert_learning_event(event, cancel).await?;
        debug!(
            event_type = event_type.as_str(),
            tenant = tenant_id,
            "Recorded learning event"
        );
        Ok(id)
    }

    /// Log an agent decision awaiting review.
    pub async fn record_decision(
        &self,
        tenant_id: &str,
        session_id: Option<&str>,
        skill_id: Option<&str>,
        context: &Value,
        decision: &Value,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.append(
            tenant_id,
            EventType::DecisionCreated,
            session_id,
            skill_id,
            context,
            Some(decision),
            None,
            Outcome::PendingReview,
            cancel,
        )
        .await
    }

    /// Log a user correction of an earlier decision.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_user_correction(
        &self,
        tenant_id: &str,
        session_id: Option<&str>,
        skill_id: Option<&str>,
        context: &Value,
        original: &Value,
        corrected: &Value,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        self.append(
            tenant_id,
            EventType::UserCorrected,
            session_id,
            skill_id,
            context,
            Some(original),
            Some(corrected),
            Outcome::Correction,
            cancel,
        )
        .await
    }

    /// Flip pending decisions whose context carries `key = value` to confirmed,
    /// and log the confirmation itself. Returns how many decisions changed.
    pub async fn confirm_decision(
        &self,
        tenant_id: &str,
        context_key: &str,
        context_value: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, AgentError> {
        let changed = self
            .store
            .confirm_pending_events(
                tenant_id,
                EventType::DecisionCreated.as_str(),
                context_key,
                context_value,
                cancel,
            )
            .await?;

        let mut context = serde_json::Map::new();
        context.insert(context_key.to_string(), Value::String(context_value.to_string()));
        context.insert("confirmedCount".to_string(), json!(changed));
        self.append(
            tenant_id,
            EventType::DecisionConfirmed,
            None,
            None,
            &Value::Object(context),
            None,
            None,
            Outcome::Confirmed,
            cancel,
        )
        .await?;

        info!(tenant = tenant_id, key = context_key, changed, "Confirmed decisions");
        Ok(changed)
    }

    /// Immediate learning: insert, or keep the new recommendation and step
    /// confidence toward the ceiling. Fallback actions are never learned.
    /// Returns whether anything was written.
    pub async fn upsert_pattern(
        &self,
        tenant_id: &str,
        pattern_type: PatternType,
        conditions: &Conditions,
        recommendation: &PostingAction,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        if recommendation.uses_any(&self.config.fallback_accounts) {
            debug!(
                pattern_type = pattern_type.as_str(),
                "Skipping fallback action"
            );
            return Ok(false);
        }

        let initial = match pattern_type {
            PatternType::DescriptionAction => self.config.description_initial_confidence,
            _ => self.config.initial_confidence,
        };
        self.store
            .reinforce_pattern(
                tenant_id,
                pattern_type.as_str(),
                conditions.to_key(),
                serde_json::to_string(recommendation)?,
                initial,
                self.config.step,
                self.config.ceiling,
                cancel,
            )
            .await?;
        Ok(true)
    }

    /// The user dictated an action in chat: log it as confirmed and learn the
    /// category and vendor patterns it implies.
    pub async fn record_chat_specification(
        &self,
        tenant_id: &str,
        session_id: Option<&str>,
        spec: &ChatSpecification,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let context = json!({
            "category": spec.category,
            "vendorName": spec.vendor,
            "summary": spec.summary,
        });
        let decision = spec.action.as_ref().map(serde_json::to_value).transpose()?;
        let id = self
            .append(
                tenant_id,
                EventType::ChatSpecifiedOverride,
                session_id,
                None,
                &context,
                decision.as_ref(),
                None,
                Outcome::Confirmed,
                cancel,
            )
            .await?;

        if let Some(action) = &spec.action {
            if let Some(category) = non_empty(spec.category.as_deref()) {
                self.upsert_pattern(
                    tenant_id,
                    PatternType::CategoryAction,
                    &Conditions::category(category),
                    action,
                    cancel,
                )
                .await?;
            }
            if let Some(vendor) = non_empty(spec.vendor.as_deref()) {
                self.upsert_pattern(
                    tenant_id,
                    PatternType::VendorAction,
                    &Conditions::vendor(vendor),
                    action,
                    cancel,
                )
                .await?;
            }
        }
        Ok(id)
    }

    /// A user re-booked a bank line: learn the corrected action for its
    /// normalized description.
    pub async fn record_description_correction(
        &self,
        tenant_id: &str,
        description: &str,
        is_withdrawal: bool,
        original: &PostingAction,
        corrected: &PostingAction,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let normalized = normalize_description(description);
        let context = json!({
            "description": description,
            "normalizedDescription": normalized,
            "isWithdrawal": is_withdrawal,
        });
        let id = self
            .append(
                tenant_id,
                EventType::UserCorrected,
                None,
                None,
                &context,
                Some(&serde_json::to_value(original)?),
                Some(&serde_json::to_value(corrected)?),
                Outcome::Correction,
                cancel,
            )
            .await?;

        if !normalized.is_empty() {
            self.upsert_pattern(
                tenant_id,
                PatternType::DescriptionAction,
                &Conditions::description(&normalized, is_withdrawal),
                corrected,
                cancel,
            )
            .await?;
        }
        Ok(id)
    }

    /// Learned patterns of one type with confidence >= 0.5, best first.
    pub async fn learned_patterns(
        &self,
        tenant_id: &str,
        pattern_type: PatternType,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearnedPattern>, AgentError> {
        let rows = self
            .store
            .query_patterns_by_type(
                tenant_id,
                pattern_type.as_str(),
                PATTERN_MIN_CONFIDENCE,
                PATTERN_QUERY_LIMIT,
                cancel,
            )
            .await?;
        Ok(rows.iter().filter_map(LearnedPattern::from_row).collect())
    }

    /// Category patterns whose category contains, or is contained in, `category`.
    /// A blank category matches nothing.
    pub async fn category_patterns(
        &self,
        tenant_id: &str,
        category: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearnedPattern>, AgentError> {
        let category = category.trim();
        if category.is_empty() {
            return Ok(Vec::new());
        }
        let rows = self
            .store
            .query_category_patterns(
                tenant_id,
                category,
                PATTERN_MIN_CONFIDENCE,
                PATTERN_QUERY_LIMIT,
                cancel,
            )
            .await?;
        Ok(rows.iter().filter_map(LearnedPattern::from_row).collect())
    }

    /// Look up the learned action for a bank description, if any.
    pub async fn description_pattern(
        &self,
        tenant_id: &str,
        description: &str,
        is_withdrawal: bool,
        cancel: &CancellationToken,
    ) -> Result<Option<LearnedPattern>, AgentError> {
        let conditions =
            Conditions::description(&normalize_description(description), is_withdrawal);
        let row = self
            .store
            .get_pattern(
                tenant_id,
                PatternType::DescriptionAction.as_str(),
                &conditions.to_key(),
                cancel,
            )
            .await?;
        Ok(row.as_ref().and_then(LearnedPattern::from_row))
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
