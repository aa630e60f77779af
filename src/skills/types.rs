// src/skills/types.rs — Skill trait and conversation state

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::infra::errors::AgentError;

const MAX_RECENT_OBJECTS: usize = 10;
pub const DEFAULT_FOLLOW_UP_WINDOW_MINUTES: i64 = 15;

fn default_follow_up_window() -> i64 {
    DEFAULT_FOLLOW_UP_WINDOW_MINUTES
}

/// A business object the conversation has touched (a voucher, an invoice, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessObjectRef {
    pub object_type: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl BusinessObjectRef {
    pub fn new(object_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            object_type: object_type.into(),
            id: id.into(),
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Per-session state, persisted as the session's opaque state blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub session_id: String,
    pub tenant_id: String,
    pub user_id: String,
    pub channel: String,
    #[serde(default)]
    pub active_skill: Option<String>,
    /// Most recent first.
    #[serde(default)]
    pub recent_objects: Vec<BusinessObjectRef>,
    #[serde(default)]
    pub last_action_time: Option<DateTime<Utc>>,
    #[serde(default = "default_follow_up_window")]
    pub follow_up_window_minutes: i64,
    #[serde(default)]
    pub last_task_id: Option<String>,
    /// Free-form state owned by the active skill.
    #[serde(default)]
    pub skill_state: Option<Value>,
}

impl ConversationContext {
    pub fn new(
        session_id: impl Into<String>,
        tenant_id: impl Into<String>,
        user_id: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            tenant_id: tenant_id.into(),
            user_id: user_id.into(),
            channel: channel.into(),
            active_skill: None,
            recent_objects: Vec::new(),
            last_action_time: None,
            follow_up_window_minutes: DEFAULT_FOLLOW_UP_WINDOW_MINUTES,
            last_task_id: None,
            skill_state: None,
        }
    }

    pub fn with_follow_up_window(mut self, minutes: i64) -> Self {
        self.follow_up_window_minutes = minutes;
        self
    }

    /// Register an object as most recent. Re-touching an object moves it to
    /// the top; the stack keeps at most ten entries.
    pub fn push_object(&mut self, object: BusinessObjectRef) {
        self.recent_objects
            .retain(|o| !(o.object_type == object.object_type && o.id == object.id));
        self.recent_objects.insert(0, object);
        self.recent_objects.truncate(MAX_RECENT_OBJECTS);
    }

    pub fn latest_object(&self, object_type: &str) -> Option<&BusinessObjectRef> {
        self.recent_objects
            .iter()
            .find(|o| o.object_type == object_type)
    }

    pub fn activate_skill(&mut self, skill: &str, task_id: Option<String>, now: DateTime<Utc>) {
        self.active_skill = Some(skill.to_string());
        self.last_action_time = Some(now);
        if task_id.is_some() {
            self.last_task_id = task_id;
        }
    }

    pub fn deactivate_skill(&mut self) {
        self.active_skill = None;
        self.last_task_id = None;
        self.skill_state = None;
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_action_time = Some(now);
    }

    /// A window too large to represent counts as no window.
    pub fn is_within_follow_up_window(&self, now: DateTime<Utc>) -> bool {
        let Some(window) = Duration::try_minutes(self.follow_up_window_minutes) else {
            return false;
        };
        match (&self.active_skill, self.last_action_time) {
            (Some(_), Some(last)) => now.signed_duration_since(last) < window,
            _ => false,
        }
    }
}

/// Answer to "is this message a follow-up you own?".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUpCheck {
    pub can_handle: bool,
    pub reason: String,
    pub target_task_id: Option<String>,
}

impl FollowUpCheck {
    pub fn accept(reason: impl Into<String>, target_task_id: Option<String>) -> Self {
        Self {
            can_handle: true,
            reason: reason.into(),
            target_task_id,
        }
    }

    pub fn decline(reason: impl Into<String>) -> Self {
        Self {
            can_handle: false,
            reason: reason.into(),
            target_task_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickAction {
    pub label: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkillResult {
    pub success: bool,
    pub message: String,
    pub task_id: Option<String>,
    pub objects: Vec<BusinessObjectRef>,
    pub quick_actions: Vec<QuickAction>,
    pub data: Option<Value>,
}

impl SkillResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_object(mut self, object: BusinessObjectRef) -> Self {
        self.objects.push(object);
        self
    }
}

/// A pluggable handler for one class of user intent.
#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    /// Intents this skill claims: exact names, `prefix.*`, or `*`.
    fn intent_patterns(&self) -> &[&str];

    /// Channels served; empty means every channel.
    fn supported_channels(&self) -> &[&str] {
        &[]
    }

    /// Kind of task this skill creates, used to break ties between claimants.
    fn task_type(&self) -> Option<&str> {
        None
    }

    async fn can_handle_follow_up(&self, ctx: &ConversationContext, message: &str) -> FollowUpCheck;

    async fn handle_follow_up(
        &self,
        ctx: &mut ConversationContext,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError>;

    async fn handle(
        &self,
        ctx: &mut ConversationContext,
        intent: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError>;
}

/// `invoice.*` matches `invoice.create`; `*` matches anything.
pub fn intent_matches(pattern: &str, intent: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    match pattern.strip_suffix('*') {
        Some(prefix) => intent.starts_with(prefix),
        None => pattern.eq_ignore_ascii_case(intent),
    }
}
