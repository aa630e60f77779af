// tests/skills_test.rs — Integration test: skill registry and follow-up dispatch

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use ledgerpilot::infra::config::RouterConfig;
use ledgerpilot::infra::errors::AgentError;
use ledgerpilot::routing::MessageTaskRouter;
use ledgerpilot::skills::{
    BusinessObjectRef, ConversationContext, Dispatch, FollowUpCheck, Skill, SkillDispatcher,
    SkillRegistry, SkillResult,
};
use ledgerpilot::storage::StorageManager;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

/// Claims follow-ups that mention a `#` label.
struct InvoiceSkill;

#[async_trait]
impl Skill for InvoiceSkill {
    fn name(&self) -> &str {
        "invoice"
    }

    fn intent_patterns(&self) -> &[&str] {
        &["invoice.*"]
    }

    fn task_type(&self) -> Option<&str> {
        Some("invoice")
    }

    async fn can_handle_follow_up(
        &self,
        ctx: &ConversationContext,
        message: &str,
    ) -> FollowUpCheck {
        if message.contains('#') {
            FollowUpCheck::accept("mentions a task label", ctx.last_task_id.clone())
        } else {
            FollowUpCheck::decline("unrelated message")
        }
    }

    async fn handle_follow_up(
        &self,
        _ctx: &mut ConversationContext,
        message: &str,
        _cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError> {
        Ok(SkillResult::ok(format!("updated: {message}")))
    }

    async fn handle(
        &self,
        _ctx: &mut ConversationContext,
        _intent: &str,
        _message: &str,
        _cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError> {
        Ok(SkillResult::ok("invoice drafted")
            .with_task("task-1")
            .with_object(BusinessObjectRef::new("voucher", "v-1").with_label("#1")))
    }
}

/// Generic document skill with a fixed task type; never claims follow-ups.
struct DocumentSkill {
    name: &'static str,
    task_type: &'static str,
}

#[async_trait]
impl Skill for DocumentSkill {
    fn name(&self) -> &str {
        self.name
    }

    fn intent_patterns(&self) -> &[&str] {
        &["document.*"]
    }

    fn supported_channels(&self) -> &[&str] {
        &["web", "line"]
    }

    fn task_type(&self) -> Option<&str> {
        Some(self.task_type)
    }

    async fn can_handle_follow_up(
        &self,
        _ctx: &ConversationContext,
        _message: &str,
    ) -> FollowUpCheck {
        FollowUpCheck::decline("no follow-ups")
    }

    async fn handle_follow_up(
        &self,
        _ctx: &mut ConversationContext,
        _message: &str,
        _cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError> {
        Ok(SkillResult::failed("unreachable"))
    }

    async fn handle(
        &self,
        _ctx: &mut ConversationContext,
        _intent: &str,
        _message: &str,
        _cancel: &CancellationToken,
    ) -> Result<SkillResult, AgentError> {
        Ok(SkillResult::ok(format!("{} handled", self.name)))
    }
}

fn registry() -> Arc<SkillRegistry> {
    let mut registry = SkillRegistry::new();
    registry.register(Arc::new(InvoiceSkill)).unwrap();
    registry
        .register(Arc::new(DocumentSkill {
            name: "invoice-docs",
            task_type: "invoice",
        }))
        .unwrap();
    registry
        .register(Arc::new(DocumentSkill {
            name: "receipt-docs",
            task_type: "receipt",
        }))
        .unwrap();
    Arc::new(registry)
}

fn ctx() -> ConversationContext {
    ConversationContext::new("s1", "acme", "u1", "web")
}

#[test]
fn test_duplicate_skill_names_rejected() {
    let mut registry = SkillRegistry::new();
    registry.register(Arc::new(InvoiceSkill)).unwrap();
    assert!(registry.register(Arc::new(InvoiceSkill)).is_err());
    assert_eq!(registry.all().len(), 1);
}

#[test]
fn test_matching_respects_channels() {
    let registry = registry();
    let names = |channel: &str| -> Vec<String> {
        registry
            .matching("document.upload", channel)
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    };
    assert_eq!(names("web"), vec!["invoice-docs", "receipt-docs"]);
    assert!(names("email").is_empty());
}

#[tokio::test]
async fn test_matched_skill_becomes_active_then_owns_follow_up() {
    let dispatcher = SkillDispatcher::new(registry());
    let cancel = CancellationToken::new();
    let mut ctx = ctx();

    let first = dispatcher
        .dispatch(&mut ctx, "invoice.create", "here is the bill", &cancel)
        .await
        .unwrap();
    assert!(matches!(first, Dispatch::Matched { ref skill, .. } if skill == "invoice"));
    assert_eq!(ctx.active_skill.as_deref(), Some("invoice"));
    assert_eq!(ctx.last_task_id.as_deref(), Some("task-1"));
    assert_eq!(ctx.latest_object("voucher").unwrap().id, "v-1");

    let second = dispatcher
        .dispatch(&mut ctx, "chat", "change #1 vendor to ABC", &cancel)
        .await
        .unwrap();
    match second {
        Dispatch::FollowUp { skill, reason, result } => {
            assert_eq!(skill, "invoice");
            assert_eq!(reason, "mentions a task label");
            assert_eq!(result.message, "updated: change #1 vendor to ABC");
        }
        other => panic!("expected follow-up, got {other:?}"),
    }
}

#[tokio::test]
async fn test_declined_follow_up_deactivates_skill() {
    let dispatcher = SkillDispatcher::new(registry());
    let cancel = CancellationToken::new();
    let mut ctx = ctx();
    ctx.activate_skill("invoice", Some("task-1".into()), Utc::now());

    let result = dispatcher
        .dispatch(&mut ctx, "smalltalk", "what's the weather", &cancel)
        .await
        .unwrap();
    assert_eq!(result, Dispatch::Unhandled);
    assert!(ctx.active_skill.is_none());
    assert!(ctx.last_task_id.is_none());
}

#[tokio::test]
async fn test_expired_window_skips_follow_up_check() {
    let dispatcher = SkillDispatcher::new(registry());
    let cancel = CancellationToken::new();
    let mut ctx = ctx();
    ctx.activate_skill("invoice", None, Utc::now() - Duration::minutes(30));

    let result = dispatcher
        .dispatch(&mut ctx, "invoice.create", "#2 is new", &cancel)
        .await
        .unwrap();
    assert!(matches!(result, Dispatch::Matched { .. }));
}

#[tokio::test]
async fn test_router_breaks_tie_between_claimants() {
    let store = StorageManager::in_memory().unwrap().spawn(16);
    let cancel = CancellationToken::new();
    store.insert_session("s1", "acme", "u1", "web", &cancel).await.unwrap();
    store
        .create_task("s1", "acme", "receipt", "Taxi receipt", Some("#4"), &cancel)
        .await
        .unwrap();

    let dispatcher = SkillDispatcher::new(registry())
        .with_router(MessageTaskRouter::new(store.clone(), RouterConfig::default()));
    let mut ctx = ctx();
    let result = dispatcher
        .dispatch(&mut ctx, "document.upload", "another page for this", &cancel)
        .await
        .unwrap();
    assert!(matches!(result, Dispatch::Matched { ref skill, .. } if skill == "receipt-docs"));

    // Without a router the first registered claimant wins.
    let mut ctx = self::ctx();
    let result = SkillDispatcher::new(registry())
        .dispatch(&mut ctx, "document.upload", "another page for this", &cancel)
        .await
        .unwrap();
    assert!(matches!(result, Dispatch::Matched { ref skill, .. } if skill == "invoice-docs"));
}
