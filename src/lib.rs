// src/lib.rs — Library root for LedgerPilot

pub mod cli;
pub mod context;
pub mod core;
pub mod infra;
pub mod learner;
pub mod patterns;
pub mod provider;
pub mod routing;
pub mod skills;
pub mod storage;
pub mod tools;
pub mod util;
