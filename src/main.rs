//! cloudai-portal: staged cloud security range
//!
//! Runs the portal by default, or the monitoring function with `monitor`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use cloudai_portal::config::{Config, ProgressBackend};
use cloudai_portal::monitor::{self, MetadataRelay};
use cloudai_portal::progress::open_store;
use cloudai_portal::{create_router, AppState};

#[derive(Parser)]
#[command(name = "cloudai-portal")]
#[command(about = "Staged cloud security range with a simulated escalation chain")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "cloudai-portal.toml")]
    config: PathBuf,

    /// Listen address (overrides config file)
    #[arg(long, env = "LISTEN")]
    listen: Option<std::net::SocketAddr>,

    /// Keep progress in memory instead of marker files
    #[arg(long)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the monitoring function (metadata relay)
    Monitor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cloudai_portal=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    info!("Config file: {}", cli.config.display());

    let mut config = Config::load(&cli.config)?;
    config.apply_env();
    if cli.ephemeral {
        config.progress.backend = ProgressBackend::Memory;
    }
    config.validate()?;

    match cli.command {
        Some(Command::Monitor) => {
            let addr = cli.listen.unwrap_or(config.monitor.listen);
            let relay = Arc::new(MetadataRelay::from_config(&config.monitor));
            info!(metadata_url = %config.monitor.metadata_url, "Monitoring function starting");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Monitoring function listening on http://{}", addr);
            axum::serve(listener, monitor::create_router(relay)).await?;
        }
        None => {
            let addr = cli.listen.unwrap_or(config.server.listen);
            let store = open_store(&config.progress)?;

            info!("Project: {}", config.server.project_id);
            info!("Region: {}", config.server.region);
            info!(backend = ?config.progress.backend, dir = %config.progress.dir.display(), "Progress store ready");
            match &config.broker.monitoring_function_url {
                Some(url) => info!("Monitoring function: {}", url),
                None => info!("Monitoring function not configured"),
            }

            let state = Arc::new(AppState::new(config, store));
            let app = create_router(state);

            let listener = tokio::net::TcpListener::bind(addr).await?;
            info!("Portal listening on http://{}", addr);
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
