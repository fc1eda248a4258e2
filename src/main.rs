use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxdash::log::init_logging;
use fxdash::rates::Currency;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxdash::AppCommand {
    fn from(cmd: Commands) -> fxdash::AppCommand {
        match cmd {
            Commands::Show { from, to, refresh } => fxdash::AppCommand::Show { from, to, refresh },
            Commands::Refresh => fxdash::AppCommand::Refresh,
            Commands::Sync => fxdash::AppCommand::Sync,
            Commands::Status => fxdash::AppCommand::Status,
            Commands::Clear => fxdash::AppCommand::Clear,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Display the rate series for a currency pair
    Show {
        /// Quote currency, e.g. EUR
        from: Currency,
        /// Counter currency, e.g. USD
        to: Currency,
        /// Bypass caches and fetch fresh data from the rate provider
        #[arg(long)]
        refresh: bool,
    },
    /// Force-refresh every supported pair from the rate provider
    Refresh,
    /// Warm the local cache from the backend store
    Sync,
    /// Show backend store coverage and local cache contents
    Status,
    /// Wipe the local rate cache, including the batch marker and call budget
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => fxdash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}

fn setup() -> anyhow::Result<()> {
    use anyhow::Context;

    let path = fxdash::config::AppConfig::default_config_path()?;

    if path.exists() {
        anyhow::bail!("Configuration file already exists at {}", path.display());
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let default_config = r#"---
provider:
  base_url: "https://www.alphavantage.co"
  # api_key: "..."   # or set FXDASH_API_KEY

# backend:
#   base_url: "http://localhost:3000/api"

base_currency: "USD"
"#;

    std::fs::write(&path, default_config)
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(())
}
