// src/skills/registry.rs — Skill registry and follow-up aware dispatch

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::types::{intent_matches, ConversationContext, Skill, SkillResult};
use crate::infra::errors::AgentError;
use crate::routing::MessageTaskRouter;

/// Central registry of all skills, in registration order.
#[derive(Default)]
pub struct SkillRegistry {
    skills: Vec<Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, skill: Arc<dyn Skill>) -> anyhow::Result<()> {
        let name = skill.name().trim();
        if name.is_empty() {
            anyhow::bail!("skill name must not be empty");
        }
        if self.get_by_name(name).is_some() {
            anyhow::bail!("skill '{name}' is already registered");
        }
        self.skills.push(skill);
        Ok(())
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.iter().find(|s| s.name() == name)
    }

    pub fn all(&self) -> &[Arc<dyn Skill>] {
        &self.skills
    }

    /// Skills claiming `intent` on `channel`, in registration order.
    pub fn matching(&self, intent: &str, channel: &str) -> Vec<Arc<dyn Skill>> {
        self.skills
            .iter()
            .filter(|s| {
                let channels = s.supported_channels();
                channels.is_empty() || channels.iter().any(|c| c.eq_ignore_ascii_case(channel))
            })
            .filter(|s| s.intent_patterns().iter().any(|p| intent_matches(p, intent)))
            .cloned()
            .collect()
    }
}

/// How a message was handled.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The active skill claimed the message as a follow-up.
    FollowUp {
        skill: String,
        reason: String,
        result: SkillResult,
    },
    /// A skill claimed the intent.
    Matched { skill: String, result: SkillResult },
    /// Nothing claimed it; the caller falls back to generic handling.
    Unhandled,
}

pub struct SkillDispatcher {
    registry: Arc<SkillRegistry>,
    router: Option<MessageTaskRouter>,
}

impl SkillDispatcher {
    pub fn new(registry: Arc<SkillRegistry>) -> Self {
        Self {
            registry,
            router: None,
        }
    }

    /// Use the task router to pick between several claiming skills.
    pub fn with_router(mut self, router: MessageTaskRouter) -> Self {
        self.router = Some(router);
        self
    }

    pub async fn dispatch(
        &self,
        ctx: &mut ConversationContext,
        intent: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Result<Dispatch, AgentError> {
        let now = Utc::now();

        if ctx.is_within_follow_up_window(now) {
            let active = ctx
                .active_skill
                .as_deref()
                .and_then(|name| self.registry.get_by_name(name))
                .cloned();
            if let Some(skill) = active {
                let check = skill.can_handle_follow_up(ctx, message).await;
                if check.can_handle {
                    debug!(skill = skill.name(), reason = %check.reason, "Follow-up accepted");
                    if check.target_task_id.is_some() {
                        ctx.last_task_id = check.target_task_id.clone();
                    }
                    let result = skill.handle_follow_up(ctx, message, cancel).await?;
                    ctx.touch(now);
                    for object in &result.objects {
                        ctx.push_object(object.clone());
                    }
                    return Ok(Dispatch::FollowUp {
                        skill: skill.name().to_string(),
                        reason: check.reason,
                        result,
                    });
                }
                info!(
                    skill = skill.name(),
                    reason = %check.reason,
                    "Active skill declined follow-up; deactivating"
                );
                ctx.deactivate_skill();
            }
        }

        let claimants = self.registry.matching(intent, &ctx.channel);
        let chosen = match claimants.len() {
            0 => {
                debug!(intent, "No skill claims intent");
                return Ok(Dispatch::Unhandled);
            }
            1 => claimants[0].clone(),
            _ => self.break_tie(ctx, message, &claimants, cancel).await,
        };

        let result = chosen.handle(ctx, intent, message, cancel).await?;
        ctx.activate_skill(chosen.name(), result.task_id.clone(), now);
        for object in &result.objects {
            ctx.push_object(object.clone());
        }
        Ok(Dispatch::Matched {
            skill: chosen.name().to_string(),
            result,
        })
    }

    /// Several skills claim the intent: prefer the one owning the task the
    /// message routes to, else the first registered claimant.
    async fn break_tie(
        &self,
        ctx: &ConversationContext,
        message: &str,
        claimants: &[Arc<dyn Skill>],
        cancel: &CancellationToken,
    ) -> Arc<dyn Skill> {
        if let Some(router) = &self.router {
            if let Some(hit) = router
                .resolve_typed(&ctx.session_id, &ctx.tenant_id, message, None, cancel)
                .await
            {
                if let Some(owner) = claimants
                    .iter()
                    .find(|s| s.task_type() == Some(hit.task_type.as_str()))
                {
                    debug!(
                        skill = owner.name(),
                        reason = %hit.reason,
                        "Tie broken by task routing"
                    );
                    return owner.clone();
                }
            }
        }
        claimants[0].clone()
    }
}
