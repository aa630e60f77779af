// src/context/builder.rs — Hint text + confidence from mined and learned patterns

use minijinja::{context, Environment};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::bands::ConfidenceBand;
use crate::infra::config::ContextConfig;
use crate::infra::errors::AgentError;
use crate::learner::types::{LearnedPattern, PatternType, PostingAction};
use crate::learner::LearningCollector;
use crate::patterns::{BookingTemplate, HistoryMiner, SimilarTransaction};
use crate::util::{contains_ignore_case, truncate_str};

const TEMPLATE_BONUS: f64 = 0.30;
const DOMINANT_TEMPLATE_BONUS: f64 = 0.15;
const DOMINANT_TEMPLATE_MIN_COUNT: i64 = 3;
const SIMILAR_AMOUNT_BONUS: f64 = 0.10;
const SIMILAR_AMOUNT_SHOWN: u32 = 3;
const LEARNED_WEIGHT: f64 = 0.20;
const CATEGORY_BONUS: f64 = 0.05;
const KEY_FIELDS_BONUS: f64 = 0.05;

const GUIDANCE_TEMPLATE: &str = "\
## Booking guidance
Confidence: {{ confidence }} ({{ band }}, {{ directive }})
{{ instruction }}
{%- if recommendation %}
Recommended action: {{ recommendation }}
{%- endif %}
{%- if hints %}

## Historical hints
{{ hints }}
{%- endif %}
";

/// Key fields extracted from the current input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputFields {
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub document_type: Option<String>,
}

impl InputFields {
    /// Read `partnerName`, `totalAmount`, `category`, `documentType`.
    /// Amounts may arrive as numbers or numeric strings.
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| {
            value[key]
                .as_str()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        let amount = match &value["totalAmount"] {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
            _ => None,
        };
        Self {
            vendor: text("partnerName"),
            amount,
            category: text("category"),
            document_type: text("documentType"),
        }
    }
}

/// Everything the model needs to decide how autonomously to act.
#[derive(Debug, Clone, PartialEq)]
pub struct SkillContext {
    pub hints: String,
    pub confidence: f64,
    pub band: ConfidenceBand,
    pub instruction: String,
    pub recommendation: Option<PostingAction>,
}

impl SkillContext {
    pub fn directive(&self) -> &'static str {
        self.band.directive()
    }

    /// Render the prompt section appended to the skill's system prompt.
    pub fn render(&self) -> Result<String, AgentError> {
        let env = Environment::new();
        let rendered = env.render_str(
            GUIDANCE_TEMPLATE,
            context! {
                confidence => format!("{:.2}", self.confidence),
                band => self.band.as_str(),
                directive => self.band.directive(),
                instruction => &self.instruction,
                recommendation => self.recommendation.as_ref().map(PostingAction::describe),
                hints => self.hints.trim_end(),
            },
        )?;
        Ok(rendered)
    }
}

pub struct ContextBuilder {
    miner: HistoryMiner,
    collector: LearningCollector,
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new(miner: HistoryMiner, collector: LearningCollector, config: ContextConfig) -> Self {
        Self {
            miner,
            collector,
            config,
        }
    }

    pub async fn build(
        &self,
        tenant_id: &str,
        input: &InputFields,
        cancel: &CancellationToken,
    ) -> SkillContext {
        let mut confidence = self.config.base_confidence;
        let mut hints = String::new();
        let mut recommendation: Option<PostingAction> = None;

        if let Some(vendor) = &input.vendor {
            let templates = self
                .miner
                .vendor_booking_templates(tenant_id, vendor, cancel)
                .await;
            if !templates.is_empty() {
                confidence += TEMPLATE_BONUS;
                if templates.len() == 1 && templates[0].usage_count >= DOMINANT_TEMPLATE_MIN_COUNT {
                    confidence += DOMINANT_TEMPLATE_BONUS;
                }
                hints.push_str(&template_hints(vendor, &templates));
                recommendation = Some(templates[0].action.clone());
            }
        }

        if let Some(amount) = input.amount {
            let similar = self
                .miner
                .similar_amounts(tenant_id, amount, SIMILAR_AMOUNT_SHOWN, cancel)
                .await;
            if !similar.is_empty() {
                confidence += SIMILAR_AMOUNT_BONUS;
                hints.push_str(&similar_hints(&similar));
            }
        }

        if let Some(vendor) = &input.vendor {
            if let Some(best) = self.best_vendor_pattern(tenant_id, vendor, cancel).await {
                confidence += best.confidence * LEARNED_WEIGHT;
                hints.push_str(&learned_hint("vendor", vendor, &best));
                recommendation = Some(best.recommendation.clone());
            }
        }

        if let Some(category) = &input.category {
            if recommendation.is_none() {
                let templates = self
                    .miner
                    .category_booking_templates(tenant_id, category, cancel)
                    .await;
                if !templates.is_empty() {
                    hints.push_str(&template_hints(category, &templates));
                }
            }
            if let Some(best) = self.best_category_pattern(tenant_id, category, cancel).await {
                confidence += best.confidence * LEARNED_WEIGHT;
                hints.push_str(&learned_hint("category", category, &best));
                if recommendation.is_none() {
                    recommendation = Some(best.recommendation.clone());
                }
            }
            confidence += CATEGORY_BONUS;
        }

        if input.vendor.is_some() && input.amount.is_some() {
            confidence += KEY_FIELDS_BONUS;
        }

        let confidence = confidence.clamp(0.0, self.config.max_confidence);
        let band = ConfidenceBand::from_confidence(confidence, &self.config.bands);

        info!(
            tenant = tenant_id,
            vendor = input.vendor.as_deref().unwrap_or("unknown"),
            amount = input.amount.unwrap_or(0.0),
            confidence = format!("{confidence:.2}"),
            band = band.as_str(),
            "Built skill context"
        );

        SkillContext {
            hints,
            confidence,
            band,
            instruction: band.instruction(self.config.language).to_string(),
            recommendation,
        }
    }

    /// Highest-confidence vendor pattern whose vendor appears in the input vendor.
    async fn best_vendor_pattern(
        &self,
        tenant_id: &str,
        vendor: &str,
        cancel: &CancellationToken,
    ) -> Option<LearnedPattern> {
        let patterns = match self
            .collector
            .learned_patterns(tenant_id, PatternType::VendorAction, cancel)
            .await
        {
            Ok(p) => p,
            Err(e) => {
                warn!(tenant = tenant_id, "Learned vendor patterns unavailable: {e}");
                return None;
            }
        };
        patterns.into_iter().find(|p| {
            p.conditions
                .get_str("vendorName")
                .map(|v| contains_ignore_case(vendor, v))
                .unwrap_or(false)
        })
    }

    async fn best_category_pattern(
        &self,
        tenant_id: &str,
        category: &str,
        cancel: &CancellationToken,
    ) -> Option<LearnedPattern> {
        match self
            .collector
            .category_patterns(tenant_id, category, cancel)
            .await
        {
            Ok(patterns) => patterns.into_iter().next(),
            Err(e) => {
                warn!(tenant = tenant_id, "Learned category patterns unavailable: {e}");
                None
            }
        }
    }
}

fn template_hints(subject: &str, templates: &[BookingTemplate]) -> String {
    let mut out = format!("Past bookings for \"{subject}\":\n");
    for t in templates {
        out.push_str(&format!("- {} (used {} times)", t.action.describe(), t.usage_count));
        if let Some(summary) = t.summary.as_deref().filter(|s| !s.is_empty()) {
            out.push_str(&format!(" e.g. \"{}\"", truncate_str(summary, 80)));
        }
        out.push('\n');
    }
    if templates.len() == 1 && templates[0].usage_count >= DOMINANT_TEMPLATE_MIN_COUNT {
        out.push_str("Always booked the same way; reuse it.\n");
    }
    out
}

fn similar_hints(similar: &[SimilarTransaction]) -> String {
    let mut out = String::from("Recent entries with a similar amount:\n");
    for s in similar {
        out.push_str(&format!(
            "- {} {} {:.2} DR {} / CR {}",
            s.posting_date,
            s.document_no,
            s.amount,
            s.debit_action.as_deref().unwrap_or("?"),
            s.credit_action.as_deref().unwrap_or("?"),
        ));
        if let Some(summary) = s.summary.as_deref().filter(|x| !x.is_empty()) {
            out.push_str(&format!(" \"{}\"", truncate_str(summary, 60)));
        }
        out.push('\n');
    }
    out
}

fn learned_hint(kind: &str, key: &str, pattern: &LearnedPattern) -> String {
    format!(
        "Learned: {kind} \"{key}\" is booked as {} in {}% of confirmed cases ({} samples).\n",
        pattern.recommendation.describe(),
        (pattern.confidence * 100.0).round() as i64,
        pattern.sample_count
    )
}
