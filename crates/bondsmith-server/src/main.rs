//! Bondsmith grant server
//!
//! Serves the grant protocol websocket and status endpoints.

use anyhow::Result;
use bondsmith_server::{GrantServer, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "bondsmith-server")]
#[command(about = "Deliver facilitator grants to connected player clients", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "bondsmith.toml")]
    config: PathBuf,

    /// Override the configured bind address
    #[arg(short, long)]
    bind: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ServerConfig::load_or_default(&cli.config)?;
    config.merge_with_env();
    if let Some(bind) = cli.bind {
        config.bind_address = bind;
    }

    let log_level = if cli.verbose {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(config = %cli.config.display(), "Loaded configuration");
    GrantServer::from_config(config).run(shutdown_signal()).await
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
