// crates/fleet-client/src/main.rs

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_client::{
    ClientConfig, ClientEvent, ConnectionManager, EventRx, JsonFileCollection, SyncCoordinator,
};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(name = "fleet-client")]
#[clap(about = "Push, pull or watch the shared fleet record snapshot")]
struct Cli {
    /// TOML config file
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Server host, overrides the config
    #[clap(long)]
    host: Option<String>,

    /// Server port, overrides the config
    #[clap(short, long)]
    port: Option<String>,

    /// Local collection file, overrides the config
    #[clap(long)]
    collection: Option<PathBuf>,

    /// Enable debug logging
    #[clap(short, long)]
    debug: bool,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stay connected and print notifications until Ctrl-C
    Watch,
    /// Replace the server's snapshot with the local collection
    Push,
    /// Replace the local collection with the server's snapshot
    Pull,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(path) = cli.collection {
        config.collection_path = path;
    }
    let port = cli.port.unwrap_or_else(|| config.port.to_string());
    let host = config.host.clone();
    let collection_path = config.collection_path.clone();

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_events(events_rx));

    let mut manager = ConnectionManager::new(config, events_tx);
    let connection = manager.connect(&host, &port).await?;

    match cli.command {
        Command::Watch => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("interrupted"),
                _ = connection.closed() => println!("server closed the connection"),
            }
        }
        Command::Push => {
            let collection = JsonFileCollection::load(&collection_path)
                .with_context(|| format!("loading {}", collection_path.display()))?;
            let records = collection.len();
            SyncCoordinator::new(collection)
                .push_collection(&connection)
                .await?;
            println!("pushed {} records", records);
        }
        Command::Pull => {
            let mut sync = SyncCoordinator::new(JsonFileCollection::new(&collection_path));
            sync.pull_collection(&connection).await?;
            println!(
                "pulled {} records into {}",
                sync.collection().len(),
                collection_path.display()
            );
        }
    }

    manager.disconnect().await?;
    printer.abort();
    Ok(())
}

async fn print_events(mut events: EventRx) {
    while let Some(event) = events.recv().await {
        match event {
            ClientEvent::ConnectionEstablished(connection) => {
                println!("connected to {}", connection.peer_addr());
            }
            ClientEvent::ConnectionFailed(reason) => println!("connection failed: {}", reason),
            ClientEvent::MessageReceived { text, received_at } => {
                print!("[{}] {}", received_at.format("%H:%M:%S"), text);
                if !text.ends_with('\n') {
                    println!();
                }
            }
            ClientEvent::RosterChanged(peers) => info!(peers = peers.len(), "roster changed"),
            ClientEvent::Disconnected => println!("disconnected"),
        }
    }
}
