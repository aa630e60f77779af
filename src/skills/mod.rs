// src/skills/mod.rs — Skills and follow-up dispatch

pub mod registry;
pub mod types;

pub use registry::{Dispatch, SkillDispatcher, SkillRegistry};
pub use types::{
    BusinessObjectRef, ConversationContext, FollowUpCheck, QuickAction, Skill, SkillResult,
};
