// src/context/mod.rs — Confidence-driven prompt context

pub mod bands;
pub mod builder;

pub use bands::ConfidenceBand;
pub use builder::{ContextBuilder, InputFields, SkillContext};
