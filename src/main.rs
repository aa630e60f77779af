// src/main.rs — LedgerPilot host binary

use std::path::Path;

use clap::Parser;

use ledgerpilot::cli::{self, Cli, Commands};
use ledgerpilot::infra::config::Config;
use ledgerpilot::infra::logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init_logging(&cli.log_level);

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => Config::load_from(Path::new(path))?,
        None => Config::load()?,
    };

    match cli.command {
        Commands::Run => cli::run::run_service(&config).await,
        Commands::Consolidate { tenant } => cli::run::run_consolidate(&config, &tenant).await,
        Commands::Migrate { status, rollback } => {
            cli::migrate::run_migrate(&config.storage.db_path(), status, rollback)
        }
    }
}
