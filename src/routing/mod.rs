// src/routing/mod.rs — Message to task routing

pub mod router;

pub use router::{route, MessageTaskRouter, RouteMatch, RouteStrategy, TaskSummary};
