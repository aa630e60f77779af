// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::infra::paths;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub learning: LearningConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub agent: AgentConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite file. Defaults to the platform data directory.
    pub path: Option<PathBuf>,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: None,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(paths::db_path)
    }
}

fn default_channel_capacity() -> usize {
    100
}

/// One rung of the count → confidence ladder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LadderStep {
    pub min_count: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub initial_confidence: f64,
    pub description_initial_confidence: f64,
    pub step: f64,
    pub ceiling: f64,
    pub vendor_min_support: u32,
    pub category_min_support: u32,
    pub vendor_base_confidence: f64,
    pub category_base_confidence: f64,
    pub ladder: Vec<LadderStep>,
    /// Catch-all actions that must never be learned as recommendations.
    pub fallback_accounts: Vec<String>,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            initial_confidence: 0.70,
            description_initial_confidence: 0.75,
            step: 0.05,
            ceiling: 0.98,
            vendor_min_support: 2,
            category_min_support: 1,
            vendor_base_confidence: 0.60,
            category_base_confidence: 0.65,
            ladder: vec![
                LadderStep {
                    min_count: 10,
                    confidence: 0.95,
                },
                LadderStep {
                    min_count: 5,
                    confidence: 0.85,
                },
                LadderStep {
                    min_count: 3,
                    confidence: 0.75,
                },
            ],
            fallback_accounts: vec!["183".into(), "319".into()],
        }
    }
}

impl LearningConfig {
    /// Confidence for `count` observations; `base` when no rung applies.
    pub fn ladder_confidence(&self, count: u32, base: f64) -> f64 {
        self.ladder
            .iter()
            .filter(|step| count >= step.min_count)
            .map(|step| step.confidence)
            .fold(None, |best: Option<f64>, c| Some(best.map_or(c, |b| b.max(c))))
            .unwrap_or(base)
    }

    pub fn is_fallback(&self, action_code: &str) -> bool {
        self.fallback_accounts.iter().any(|a| a == action_code)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ja,
    Zh,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BandThresholds {
    pub high: f64,
    pub medium_high: f64,
    pub medium: f64,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            high: 0.85,
            medium_high: 0.65,
            medium: 0.45,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    pub base_confidence: f64,
    pub max_confidence: f64,
    pub language: Language,
    pub bands: BandThresholds,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            base_confidence: 0.30,
            max_confidence: 0.98,
            language: Language::En,
            bands: BandThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    pub recent_window_minutes: i64,
    pub task_limit: u32,
    pub reference_digits: usize,
    pub task_type: String,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            recent_window_minutes: 30,
            task_limit: 20,
            reference_digits: 10,
            task_type: "invoice".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub follow_up_window_minutes: i64,
    pub max_tool_rounds: u32,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            follow_up_window_minutes: 15,
            max_tool_rounds: 20,
            model: None,
            base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_hours: u64,
    pub startup_delay_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_hours: 24,
            startup_delay_secs: 120,
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
