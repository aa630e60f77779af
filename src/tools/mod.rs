// src/tools/mod.rs — Tool trait and the shapes a tool call produces

pub mod registry;

pub use registry::ToolRegistry;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::infra::errors::AgentError;
use crate::learner::types::DecisionRecord;
use crate::provider::ToolDef;

/// Who a tool is running for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionContext {
    pub tenant_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// Skill driving the turn, if any. Used when logging decisions.
    pub skill_id: Option<String>,
}

impl ExecutionContext {
    pub fn new(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            ..Default::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_skill(mut self, skill_id: impl Into<String>) -> Self {
        self.skill_id = Some(skill_id.into());
        self
    }
}

/// A message for the user rather than the model, e.g. a card for a voucher
/// that was just created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideMessage {
    pub kind: String,
    pub payload: Value,
}

impl SideMessage {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Self {
            kind: kind.into(),
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Fed back to the model as the tool message content.
    pub result: Value,
    pub messages: Vec<SideMessage>,
    pub decision: Option<DecisionRecord>,
}

impl ToolOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            messages: Vec::new(),
            decision: None,
        }
    }

    /// The structured error payload the model sees for a failed call.
    pub fn error(tool: &str, message: impl Into<String>) -> Self {
        Self::new(json!({ "error": message.into(), "tool": tool }))
    }

    pub fn with_message(mut self, message: SideMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_decision(mut self, decision: DecisionRecord) -> Self {
        self.decision = Some(decision);
        self
    }

    pub fn is_error(&self) -> bool {
        self.result.get("error").is_some()
    }
}

/// A named action the model can invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn definition(&self) -> ToolDef {
        ToolDef {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }

    async fn execute(
        &self,
        args: Value,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> Result<ToolOutput, AgentError>;
}
