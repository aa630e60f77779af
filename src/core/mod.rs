// src/core/mod.rs — Turn execution

pub mod executor;

pub use executor::{ToolRecord, TurnExecutor, TurnOutcome, TurnStop};
