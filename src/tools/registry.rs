// src/tools/registry.rs — Name to tool lookup with an error boundary around every call

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{ExecutionContext, Tool, ToolOutput};
use crate::infra::errors::AgentError;
use crate::provider::ToolDef;

/// Tools keyed by lowercased name; definitions keep registration order.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), AgentError> {
        let key = tool.name().trim().to_lowercase();
        if key.is_empty() {
            return Err(AgentError::InvalidToolRegistration(
                "tool name must not be empty".into(),
            ));
        }
        if self.tools.contains_key(&key) {
            return Err(AgentError::InvalidToolRegistration(format!(
                "tool '{key}' is already registered"
            )));
        }
        self.order.push(key.clone());
        self.tools.insert(key, tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn definitions(&self) -> Vec<ToolDef> {
        self.order
            .iter()
            .filter_map(|k| self.tools.get(k))
            .map(|t| t.definition())
            .collect()
    }

    /// Run one tool call. Never fails: unknown tools, bad arguments, tool
    /// errors and panics all come back as an `{"error": ...}` result.
    pub async fn execute(
        &self,
        name: &str,
        arguments: &str,
        ctx: &ExecutionContext,
        cancel: &CancellationToken,
    ) -> ToolOutput {
        let Some(tool) = self.get(name) else {
            let err = AgentError::ToolNotFound {
                name: name.to_string(),
            };
            warn!(tool = name, "{err}");
            return ToolOutput::error(name, err.to_string());
        };

        let args = match parse_arguments(name, arguments) {
            Ok(args) => args,
            Err(err) => {
                warn!(tool = name, "{err}");
                return ToolOutput::error(name, err.to_string());
            }
        };

        debug!(tool = name, tenant = %ctx.tenant_id, "Executing tool");
        match AssertUnwindSafe(tool.execute(args, ctx, cancel))
            .catch_unwind()
            .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                warn!(tool = name, "Tool returned an error: {err}");
                ToolOutput::error(name, err.to_string())
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                warn!(tool = name, "Tool panicked: {message}");
                ToolOutput::error(name, AgentError::tool_failed(name, message).to_string())
            }
        }
    }
}

/// Blank arguments mean "no arguments"; anything else must be a JSON object.
fn parse_arguments(tool: &str, raw: &str) -> Result<Value, AgentError> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|e| AgentError::InvalidToolArguments {
            tool: tool.to_string(),
            message: e.to_string(),
        })?;
    if !value.is_object() {
        return Err(AgentError::InvalidToolArguments {
            tool: tool.to_string(),
            message: "arguments must be a JSON object".into(),
        });
    }
    Ok(value)
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
