// src/learner/types.rs — Learner type definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::storage::store::LearnedPatternRow;

/// Kinds of rows in the learning event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    DecisionCreated,
    UserCorrected,
    DecisionConfirmed,
    ChatSpecifiedOverride,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DecisionCreated => "decision_created",
            Self::UserCorrected => "user_corrected",
            Self::DecisionConfirmed => "decision_confirmed",
            Self::ChatSpecifiedOverride => "chat_specified_override",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "decision_created" => Some(Self::DecisionCreated),
            "user_corrected" => Some(Self::UserCorrected),
            "decision_confirmed" => Some(Self::DecisionConfirmed),
            "chat_specified_override" => Some(Self::ChatSpecifiedOverride),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    PendingReview,
    Confirmed,
    Correction,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReview => "pending_review",
            Self::Confirmed => "confirmed",
            Self::Correction => "correction",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PatternType {
    VendorAction,
    CategoryAction,
    DescriptionAction,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::VendorAction => "vendor_action",
            Self::CategoryAction => "category_action",
            Self::DescriptionAction => "description_action",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vendor_action" => Some(Self::VendorAction),
            "category_action" => Some(Self::CategoryAction),
            "description_action" => Some(Self::DescriptionAction),
            _ => None,
        }
    }
}

/// The action a decision takes: a debit/credit pair of posting codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingAction {
    pub debit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debit_name: Option<String>,
    pub credit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<String>,
}

impl PostingAction {
    pub fn new(debit: impl Into<String>, credit: impl Into<String>) -> Self {
        Self {
            debit: debit.into(),
            debit_name: None,
            credit: credit.into(),
            credit_name: None,
        }
    }

    pub fn with_names(
        mut self,
        debit_name: impl Into<String>,
        credit_name: impl Into<String>,
    ) -> Self {
        self.debit_name = Some(debit_name.into());
        self.credit_name = Some(credit_name.into());
        self
    }

    /// Identity used for grouping; display names do not distinguish actions.
    pub fn key(&self) -> (String, String) {
        (self.debit.clone(), self.credit.clone())
    }

    pub fn uses_any(&self, codes: &[String]) -> bool {
        codes.iter().any(|c| *c == self.debit || *c == self.credit)
    }

    /// Parse a decision payload; `None` unless both codes are present.
    pub fn from_value(value: &Value) -> Option<Self> {
        let action: PostingAction = serde_json::from_value(value.clone()).ok()?;
        if action.debit.trim().is_empty() || action.credit.trim().is_empty() {
            return None;
        }
        Some(action)
    }

    pub fn describe(&self) -> String {
        let side = |code: &str, name: &Option<String>| match name {
            Some(n) if !n.is_empty() => format!("{code} {n}"),
            _ => code.to_string(),
        };
        format!(
            "DR {} / CR {}",
            side(&self.debit, &self.debit_name),
            side(&self.credit, &self.credit_name)
        )
    }
}

/// Condition fingerprint of a learned pattern. Serializes with sorted keys
/// so the same condition always produces the same stored text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditions(BTreeMap<String, Value>);

impl Conditions {
    pub fn vendor(name: &str) -> Self {
        Self::single("vendorName", Value::String(name.trim().to_string()))
    }

    pub fn category(name: &str) -> Self {
        Self::single("category", Value::String(name.trim().to_string()))
    }

    pub fn description(normalized: &str, is_withdrawal: bool) -> Self {
        let mut map = BTreeMap::new();
        map.insert("description".to_string(), Value::String(normalized.to_string()));
        map.insert("isWithdrawal".to_string(), Value::Bool(is_withdrawal));
        Self(map)
    }

    fn single(key: &str, value: Value) -> Self {
        let mut map = BTreeMap::new();
        map.insert(key.to_string(), value);
        Self(map)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn to_key(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str::<BTreeMap<String, Value>>(text)
            .ok()
            .map(Self)
    }
}

/// A decision a tool or skill wants logged for later review.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionRecord {
    pub skill_id: Option<String>,
    /// Inputs that drove the decision (`vendorName`, `category`, `invoiceId`, ...).
    pub context: Value,
    pub decision: Value,
}

/// A learned pattern with its payloads decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct LearnedPattern {
    pub pattern_type: PatternType,
    pub conditions: Conditions,
    pub recommendation: PostingAction,
    pub confidence: f64,
    pub sample_count: i64,
}

impl LearnedPattern {
    /// Decode a stored row; rows with unreadable payloads are skipped by callers.
    pub fn from_row(row: &LearnedPatternRow) -> Option<Self> {
        let recommendation: Value = serde_json::from_str(&row.recommendation).ok()?;
        Some(Self {
            pattern_type: PatternType::parse(&row.pattern_type)?,
            conditions: Conditions::parse(&row.conditions)?,
            recommendation: PostingAction::from_value(&recommendation)?,
            confidence: row.confidence,
            sample_count: row.sample_count,
        })
    }
}
