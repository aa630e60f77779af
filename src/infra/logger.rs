// src/infra/logger.rs — Structured logging with tracing

use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_ENV: &str = "LEDGERPILOT_LOG";

/// Install the global subscriber. `LEDGERPILOT_LOG` wins over `RUST_LOG`,
/// which wins over `level`. Safe to call more than once.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
