// tests/tool_loop_test.rs — Integration test: sequential tool loop with error isolation

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ledgerpilot::core::{TurnExecutor, TurnStop};
use ledgerpilot::infra::config::LearningConfig;
use ledgerpilot::infra::errors::AgentError;
use ledgerpilot::learner::{DecisionRecord, LearningCollector};
use ledgerpilot::provider::{
    ChatRequest, ChatResponse, Message, ModelProvider, Role, StopReason, ToolCall,
};
use ledgerpilot::storage::StorageManager;
use ledgerpilot::tools::{ExecutionContext, SideMessage, Tool, ToolOutput, ToolRegistry};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

/// Replays canned responses and keeps every request it saw.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ChatResponse>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ChatResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ModelProvider for ScriptedProvider {
    fn id(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, AgentError> {
        self.requests.lock().unwrap().push(request);
        Ok(self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ChatResponse {
                content: "done".into(),
                stop_reason: StopReason::EndTurn,
                ..Default::default()
            }))
    }
}

/// Appends its name to a shared log, then succeeds or fails.
struct LoggingTool {
    name: &'static str,
    fail: bool,
    log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Tool for LoggingTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        "test tool"
    }

    async fn execute(
        &self,
        args: Value,
        _ctx: &ExecutionContext,
        _cancel: &CancellationToken,
    ) -> Result<ToolOutput, AgentError> {
        self.log.lock().unwrap().push(self.name.to_string());
        if self.fail {
            return Err(AgentError::tool_failed(self.name, "ledger rejected the entry"));
        }
        Ok(ToolOutput::new(json!({ "ok": true, "echo": args }))
            .with_message(SideMessage::new("voucher", json!({ "id": self.name }))))
    }
}

fn call(id: &str, name: &str, args: &str) -> ToolCall {
    ToolCall {
        id: id.into(),
        name: name.into(),
        arguments: args.into(),
    }
}

fn registry(log: &Arc<Mutex<Vec<String>>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for (name, fail) in [("lookup_vendor", false), ("post_entry", true), ("notify", false)] {
        registry
            .register(Arc::new(LoggingTool {
                name,
                fail,
                log: log.clone(),
            }))
            .unwrap();
    }
    Arc::new(registry)
}

#[tokio::test]
async fn test_failing_middle_call_does_not_abort_turn() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let provider = Arc::new(ScriptedProvider::new(vec![
        ChatResponse {
            content: "working".into(),
            tool_calls: vec![
                call("c1", "lookup_vendor", r#"{"q":"Acme"}"#),
                call("c2", "post_entry", r#"{"amount":1000}"#),
                call("c3", "notify", "{}"),
            ],
            stop_reason: StopReason::ToolUse,
            ..Default::default()
        },
        ChatResponse {
            content: "Posting failed, vendor found, user notified.".into(),
            stop_reason: StopReason::EndTurn,
            ..Default::default()
        },
    ]));

    let exec = TurnExecutor::new(provider.clone(), registry(&log), "test-model".into());
    let out = exec
        .run_turn(
            &ExecutionContext::new("acme").with_session("s1"),
            "You are a bookkeeper.",
            vec![Message::user("book the Acme invoice")],
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(out.stop, TurnStop::Final);
    assert_eq!(out.rounds, 2);
    assert_eq!(out.content, "Posting failed, vendor found, user notified.");
    assert_eq!(
        *log.lock().unwrap(),
        vec!["lookup_vendor", "post_entry", "notify"]
    );

    let ids: Vec<&str> = out.tool_records.iter().map(|r| r.call_id.as_str()).collect();
    assert_eq!(ids, vec!["c1", "c2", "c3"]);
    assert_eq!(out.tool_records[0].result, json!({ "ok": true, "echo": { "q": "Acme" } }));
    assert!(out.tool_records[1].is_error);
    assert_eq!(
        out.tool_records[1].result["error"],
        "Tool 'post_entry' failed: ledger rejected the entry"
    );
    assert_eq!(out.tool_records[2].result, json!({ "ok": true, "echo": {} }));
    assert_eq!(out.side_messages.len(), 2);

    // The second request carries every tool result tagged with its call id.
    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    let tool_msgs: Vec<&Message> = requests[1]
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .collect();
    assert_eq!(tool_msgs.len(), 3);
    assert_eq!(tool_msgs[1].tool_call_id.as_deref(), Some("c2"));
    assert!(tool_msgs[1].content.contains("\"error\""));
    assert_eq!(requests[1].tools.len(), 3);
    assert_eq!(requests[1].system.as_deref(), Some("You are a bookkeeper."));
}

struct DecidingTool;

#[async_trait]
impl Tool for DecidingTool {
    fn name(&self) -> &str {
        "create_voucher"
    }

    fn description(&self) -> &str {
        "Create a voucher"
    }

    async fn execute(
        &self,
        _args: Value,
        _ctx: &ExecutionContext,
        _cancel: &CancellationToken,
    ) -> Result<ToolOutput, AgentError> {
        Ok(ToolOutput::new(json!({ "voucherNo": "2026000123" })).with_decision(DecisionRecord {
            skill_id: None,
            context: json!({ "vendorName": "Acme Hosting", "invoiceId": "inv-1" }),
            decision: json!({ "debit": "6100", "credit": "2100" }),
        }))
    }
}

#[tokio::test]
async fn test_tool_decisions_are_recorded() {
    let store = StorageManager::in_memory().unwrap().spawn(16);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(DecidingTool)).unwrap();

    let provider = Arc::new(ScriptedProvider::new(vec![ChatResponse {
        tool_calls: vec![call("c1", "Create_Voucher", "")],
        ..Default::default()
    }]));
    let exec = TurnExecutor::new(provider, Arc::new(registry), "test-model".into())
        .with_collector(LearningCollector::new(store.clone(), LearningConfig::default()));

    let cancel = CancellationToken::new();
    let out = exec
        .run_turn(
            &ExecutionContext::new("acme").with_session("s1").with_skill("invoice"),
            "sys",
            vec![Message::user("book it")],
            &cancel,
        )
        .await
        .unwrap();
    assert_eq!(out.stop, TurnStop::Final);
    assert_eq!(out.content, "done");

    let pending = store
        .query_events_by_outcome("acme", "pending_review", &cancel)
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].event_type, "decision_created");
    assert_eq!(pending[0].skill_id.as_deref(), Some("invoice"));
    assert_eq!(pending[0].session_id.as_deref(), Some("s1"));
}
