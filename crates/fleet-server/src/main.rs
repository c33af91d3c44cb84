//! TCP broadcast server for fleet record synchronization.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use fleet_server::config::Config;
use fleet_server::server;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "fleet-server")]
#[clap(about = "Shares one fleet record snapshot between connected clients")]
struct Cli {
    /// TOML config file (otherwise FLEET_* environment variables are used)
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overrides the config
    #[clap(short, long)]
    bind: Option<String>,

    /// Port to listen on, overrides the config
    #[clap(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => Config::from_env()?,
    };
    if let Some(bind) = cli.bind {
        config.bind_addr = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    info!(
        "Starting fleet-server on {} (max_clients = {}, snapshot = {})",
        config.socket_addr_string(),
        config.max_clients,
        config
            .snapshot_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "in-memory".to_string())
    );

    server::run(config).await?;
    Ok(())
}
