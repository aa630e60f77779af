// src/infra/errors.rs — Error types for LedgerPilot

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Tool errors (reported back to the model, never fatal to a turn)
    #[error("Unknown tool: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid arguments for tool '{tool}': {message}")]
    InvalidToolArguments { tool: String, message: String },

    #[error("Tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("Invalid tool registration: {0}")]
    InvalidToolRegistration(String),

    // Lifecycle
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Store is not running")]
    StoreUnavailable,

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AgentError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            AgentError::Provider {
                retriable: true,
                ..
            } | AgentError::RateLimited { .. }
        )
    }

    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        AgentError::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }
}
