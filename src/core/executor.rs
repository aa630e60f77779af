// src/core/executor.rs — One conversational turn: model, tools, repeat

use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::config::AgentConfig;
use crate::infra::errors::AgentError;
use crate::learner::types::DecisionRecord;
use crate::learner::LearningCollector;
use crate::provider::{ChatRequest, Message, ModelProvider, TokenUsage};
use crate::tools::{ExecutionContext, SideMessage, ToolRegistry};

pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 20;
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// Why the turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStop {
    /// The model answered without requesting tools.
    Final,
    /// The host's round cap was reached while the model still wanted tools.
    RoundLimit,
}

/// One executed tool call, in request order.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolRecord {
    pub call_id: String,
    pub name: String,
    pub result: Value,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub content: String,
    /// The full transcript including the final assistant message.
    pub messages: Vec<Message>,
    pub tool_records: Vec<ToolRecord>,
    pub side_messages: Vec<SideMessage>,
    pub rounds: usize,
    pub usage: TokenUsage,
    pub stop: TurnStop,
}

/// Drives the tool-calling loop against a model provider.
pub struct TurnExecutor {
    provider: Arc<dyn ModelProvider>,
    tools: Arc<ToolRegistry>,
    model: String,
    max_tool_rounds: usize,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    collector: Option<LearningCollector>,
}

impl TurnExecutor {
    pub fn new(provider: Arc<dyn ModelProvider>, tools: Arc<ToolRegistry>, model: String) -> Self {
        Self {
            provider,
            tools,
            model,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            max_tokens: Some(4096),
            temperature: Some(0.2),
            collector: None,
        }
    }

    /// Model and round cap from the `[agent]` section.
    pub fn from_config(
        provider: Arc<dyn ModelProvider>,
        tools: Arc<ToolRegistry>,
        config: &AgentConfig,
    ) -> Self {
        let model = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        Self::new(provider, tools, model).with_max_tool_rounds(config.max_tool_rounds as usize)
    }

    pub fn with_max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds.max(1);
        self
    }

    /// Log decisions that tools report as `decision_created` events.
    pub fn with_collector(mut self, collector: LearningCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    pub async fn run_turn(
        &self,
        ctx: &ExecutionContext,
        system: &str,
        mut messages: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<TurnOutcome, AgentError> {
        let tool_defs = self.tools.definitions();
        let mut usage = TokenUsage::default();
        let mut tool_records = Vec::new();
        let mut side_messages = Vec::new();
        let mut last_content = String::new();

        for round in 1..=self.max_tool_rounds {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            let request = ChatRequest {
                model: self.model.clone(),
                messages: messages.clone(),
                tools: tool_defs.clone(),
                max_tokens: self.max_tokens,
                temperature: self.temperature,
                system: Some(system.to_string()),
            };

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                r = self.provider.chat(request) => r?,
            };
            usage.input_tokens += response.usage.input_tokens;
            usage.output_tokens += response.usage.output_tokens;

            if response.tool_calls.is_empty() {
                messages.push(Message::assistant(&response.content));
                debug!(round, tools = tool_records.len(), "Turn finished");
                return Ok(TurnOutcome {
                    content: response.content,
                    messages,
                    tool_records,
                    side_messages,
                    rounds: round,
                    usage,
                    stop: TurnStop::Final,
                });
            }

            last_content = response.content.clone();
            messages.push(Message::assistant_with_tool_calls(
                &response.content,
                response.tool_calls.clone(),
            ));

            // Sequential on purpose: later calls may depend on earlier effects.
            for call in &response.tool_calls {
                let mut output = self
                    .tools
                    .execute(&call.name, &call.arguments, ctx, cancel)
                    .await;
                if let Some(decision) = output.decision.take() {
                    self.record_decision(ctx, decision, cancel).await;
                }
                let is_error = output.is_error();
                messages.push(Message::tool_result(&call.id, output.result.to_string()));
                side_messages.append(&mut output.messages);
                tool_records.push(ToolRecord {
                    call_id: call.id.clone(),
                    name: call.name.clone(),
                    result: output.result,
                    is_error,
                });
            }
        }

        warn!(
            rounds = self.max_tool_rounds,
            tools = tool_records.len(),
            "Tool round limit reached; ending turn"
        );
        Ok(TurnOutcome {
            content: last_content,
            messages,
            tool_records,
            side_messages,
            rounds: self.max_tool_rounds,
            usage,
            stop: TurnStop::RoundLimit,
        })
    }

    async fn record_decision(
        &self,
        ctx: &ExecutionContext,
        decision: DecisionRecord,
        cancel: &CancellationToken,
    ) {
        let Some(collector) = &self.collector else {
            return;
        };
        let skill = decision.skill_id.as_deref().or(ctx.skill_id.as_deref());
        match collector
            .record_decision(
                &ctx.tenant_id,
                ctx.session_id.as_deref(),
                skill,
                &decision.context,
                &decision.decision,
                cancel,
            )
            .await
        {
            Ok(id) => info!(event = %id, tenant = %ctx.tenant_id, "Recorded decision"),
            Err(e) => warn!(tenant = %ctx.tenant_id, "Failed to record decision: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ToolCall};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Requests a tool on every call.
    struct Loops {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl ModelProvider for Loops {
        fn id(&self) -> &str {
            "loops"
        }
        async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, AgentError> {
            let mut n = self.calls.lock().unwrap();
            *n += 1;
            Ok(ChatResponse {
                content: format!("round {n}"),
                tool_calls: vec![ToolCall {
                    id: format!("c{n}"),
                    name: "missing".into(),
                    arguments: "{}".into(),
                }],
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_round_limit_ends_turn() {
        let provider = Arc::new(Loops {
            calls: Mutex::new(0),
        });
        let exec = TurnExecutor::new(provider.clone(), Arc::new(ToolRegistry::new()), "m".into())
            .with_max_tool_rounds(3);
        let out = exec
            .run_turn(
                &ExecutionContext::new("t1"),
                "sys",
                vec![Message::user("hi")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.stop, TurnStop::RoundLimit);
        assert_eq!(out.rounds, 3);
        assert_eq!(out.tool_records.len(), 3);
        assert!(out.tool_records.iter().all(|r| r.is_error));
        assert_eq!(*provider.calls.lock().unwrap(), 3);
    }

    /// Echoes the requested model back as content.
    struct EchoModel;

    #[async_trait]
    impl ModelProvider for EchoModel {
        fn id(&self) -> &str {
            "echo"
        }
        async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentError> {
            Ok(ChatResponse {
                content: request.model,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_agent_config_sets_round_cap_and_model() {
        let provider = Arc::new(Loops {
            calls: Mutex::new(0),
        });
        let config = AgentConfig {
            max_tool_rounds: 2,
            ..Default::default()
        };
        let exec =
            TurnExecutor::from_config(provider.clone(), Arc::new(ToolRegistry::new()), &config);
        let out = exec
            .run_turn(
                &ExecutionContext::new("t1"),
                "sys",
                vec![Message::user("hi")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.stop, TurnStop::RoundLimit);
        assert_eq!(out.rounds, 2);

        let config = AgentConfig {
            model: Some("ledger-large".into()),
            ..Default::default()
        };
        let exec =
            TurnExecutor::from_config(Arc::new(EchoModel), Arc::new(ToolRegistry::new()), &config);
        let out = exec
            .run_turn(
                &ExecutionContext::new("t1"),
                "sys",
                vec![Message::user("hi")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(out.content, "ledger-large");

        let exec = TurnExecutor::from_config(
            Arc::new(EchoModel),
            Arc::new(ToolRegistry::new()),
            &AgentConfig::default(),
        );
        let out = exec
            .run_turn(&ExecutionContext::new("t1"), "sys", vec![], &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.content, DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_round() {
        let provider = Arc::new(Loops {
            calls: Mutex::new(0),
        });
        let exec = TurnExecutor::new(provider.clone(), Arc::new(ToolRegistry::new()), "m".into());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = exec
            .run_turn(&ExecutionContext::new("t1"), "sys", vec![], &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(*provider.calls.lock().unwrap(), 0);
    }
}
