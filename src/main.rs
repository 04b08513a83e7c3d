use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use fee_harvester::browser::ChromeEngineFactory;
use fee_harvester::progress::ProgressRegistry;
use fee_harvester::targets::TargetCatalog;
use fee_harvester::web::{self, AppState};
use fee_harvester::{AppConfig, ExtractionService};

#[derive(Debug, Parser)]
#[command(name = "fee-harvester", version, about = "Serves course fee tables as CSV archives")]
struct Cli {
    /// Address to bind, overrides `server.host`
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, overrides `server.port`
    #[arg(long)]
    port: Option<u16>,

    /// Path of the college catalog JSON file
    #[arg(long)]
    catalog: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("fee_harvester=debug".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(catalog) = cli.catalog {
        config.targets.catalog_path = catalog;
    }
    config.validate()?;

    info!("Starting fee-harvester...");

    let catalog = TargetCatalog::load(&config.targets);
    let registry = ProgressRegistry::new(config.progress.retention());
    let factory = Arc::new(ChromeEngineFactory::new(config.scraper.clone()));
    let service = ExtractionService::new(&config, catalog, factory, registry)?;

    let state = AppState {
        service: Arc::new(service),
        config,
    };
    web::serve(state).await
}
