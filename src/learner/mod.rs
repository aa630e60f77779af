// src/learner/mod.rs — Learning event log, immediate and batch pattern learning

pub mod collector;
pub mod consolidator;
pub mod normalize;
pub mod types;

pub use collector::{ChatSpecification, LearningCollector};
pub use consolidator::{ConsolidationReport, Consolidator};
pub use types::{Conditions, DecisionRecord, LearnedPattern, PatternType, PostingAction};
