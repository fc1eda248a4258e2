pub mod budget;
pub mod cli;
pub mod config;
pub mod error;
pub mod log;
pub mod providers;
pub mod rates;
pub mod resolver;
pub mod store;
pub mod sync;

use crate::budget::BudgetTracker;
use crate::providers::alpha_vantage::AlphaVantageClient;
use crate::providers::backend::BackendClient;
use crate::rates::Currency;
use crate::resolver::RateResolver;
use crate::store::{RateStore, disk::FjallStore};
use crate::sync::SyncOrchestrator;
use anyhow::{Context, Result, anyhow};
use std::sync::Arc;
use tracing::{debug, info};

pub enum AppCommand {
    Show {
        from: Currency,
        to: Currency,
        refresh: bool,
    },
    Refresh,
    Sync,
    Status,
    Clear,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxdash starting...");

    let config = match config_path {
        Some(path) => config::AppConfig::load_from_path(path)?,
        None => config::AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let base: Currency = config
        .base_currency
        .parse()
        .map_err(|_| anyhow!("Unsupported base currency: {}", config.base_currency))?;

    let cache_path = config.cache_path()?;
    let store: Arc<dyn RateStore> =
        Arc::new(FjallStore::open(&cache_path).context("Failed to open local rate cache")?);

    let budget = Arc::new(BudgetTracker::new(Arc::clone(&store)));
    let provider = AlphaVantageClient::new(&config.provider.base_url, &config.api_key(), budget);
    let backend = config
        .backend
        .as_ref()
        .map(|b| BackendClient::new(&b.base_url));

    let resolver = Arc::new(RateResolver::new(
        Arc::clone(&store),
        provider,
        backend,
        base,
    ));

    match command {
        AppCommand::Show { from, to, refresh } => cli::show::run(&resolver, from, to, refresh).await,
        AppCommand::Refresh => cli::refresh::run_refresh(&SyncOrchestrator::new(resolver)).await,
        AppCommand::Sync => cli::refresh::run_sync(&SyncOrchestrator::new(resolver)).await,
        AppCommand::Status => cli::status::run(resolver.backend(), resolver.store()).await,
        AppCommand::Clear => {
            store.clear().await;
            println!("Local rate cache cleared.");
            Ok(())
        }
    }
}
