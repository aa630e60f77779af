// src/cli/mod.rs — Host binary commands (clap derive)

pub mod migrate;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ledgerpilot",
    about = "Context-aware bookkeeping agent core",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Log level when neither LEDGERPILOT_LOG nor RUST_LOG is set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Run the background consolidation scheduler until Ctrl-C
    Run,
    /// Run anomaly checks and consolidation once for a tenant
    Consolidate {
        /// Tenant code
        #[arg(long)]
        tenant: String,
    },
    /// Apply pending database migrations
    Migrate {
        /// Only show the schema version
        #[arg(long)]
        status: bool,
        /// Roll back the most recent migration
        #[arg(long, conflicts_with = "status")]
        rollback: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_consolidate() {
        let cli = Cli::parse_from(["ledgerpilot", "consolidate", "--tenant", "acme"]);
        assert_eq!(
            cli.command,
            Commands::Consolidate {
                tenant: "acme".into()
            }
        );
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["ledgerpilot", "run", "--config", "/tmp/lp.toml"]);
        assert_eq!(cli.command, Commands::Run);
        assert_eq!(cli.config.as_deref(), Some("/tmp/lp.toml"));
    }

    #[test]
    fn test_migrate_flags_conflict() {
        assert!(Cli::try_parse_from(["ledgerpilot", "migrate", "--status", "--rollback"]).is_err());
    }
}
