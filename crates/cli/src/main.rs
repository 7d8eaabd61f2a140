mod commands;

use anyhow::Context;
use clap::{Parser, Subcommand};
use commands::*;
use std::path::PathBuf;
use strata_core::{init_logging, LoggingConfig, StrataConfig};

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Domain migrations and schema validation for PostgreSQL")]
struct Cli {
    /// Project file
    #[arg(long, global = true, default_value = "strata.yaml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database migration management
    Migrate {
        #[command(subcommand)]
        migrate_command: MigrateCommands,
    },

    /// Compare live schemas with the declared schema files
    Validate {
        /// Domains to validate; every domain in the schema directory when empty
        domains: Vec<String>,

        /// Print results as JSON instead of the report
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum MigrateCommands {
    /// Apply pending migrations
    Up {
        /// Domain name
        domain: String,
    },

    /// Roll back the last batch
    Down {
        /// Domain name
        domain: String,

        /// Roll back this many versions instead of the last batch
        #[arg(long, conflicts_with = "all")]
        steps: Option<usize>,

        /// Roll back every applied version
        #[arg(long)]
        all: bool,
    },

    /// Show migration status
    Status {
        /// Domain name
        domain: String,
    },

    /// Clear the dirty flag and record a clean version
    Force {
        /// Domain name
        domain: String,

        /// Version the schema is known to match (0 empties the history)
        version: i64,
    },

    /// Create a new migration file pair
    Create {
        /// Domain name
        domain: String,

        /// Migration name
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = StrataConfig::load_or_default(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    let mut logging = LoggingConfig::for_environment(config.environment).json(cli.json_logs);
    if let Some(level) = cli.log_level {
        logging = logging.with_level(level);
    }
    init_logging(logging).map_err(|e| anyhow::anyhow!("initialising logging: {}", e))?;
    tracing::debug!(
        config = %cli.config.display(),
        environment = %config.environment,
        "loaded project configuration"
    );

    match cli.command {
        Commands::Migrate { migrate_command } => match migrate_command {
            MigrateCommands::Up { domain } => {
                migrate::up(&config, &domain).await?;
            }
            MigrateCommands::Down { domain, steps, all } => {
                let target = match (steps, all) {
                    (_, true) => migrate::DownTarget::All,
                    (Some(steps), false) => migrate::DownTarget::Steps(steps),
                    (None, false) => migrate::DownTarget::LastBatch,
                };
                migrate::down(&config, &domain, target).await?;
            }
            MigrateCommands::Status { domain } => {
                migrate::status(&config, &domain).await?;
            }
            MigrateCommands::Force { domain, version } => {
                migrate::force(&config, &domain, version).await?;
            }
            MigrateCommands::Create { domain, name } => {
                migrate::create(&config, &domain, &name)?;
            }
        },
        Commands::Validate { domains, json } => {
            let all_valid = validate::run(&config, &domains, json).await?;
            if !all_valid {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
