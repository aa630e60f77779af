// src/patterns/mod.rs — Historical booking pattern mining

pub mod miner;

pub use miner::{ActionUsage, BookingTemplate, HistoryMiner, SimilarTransaction};
