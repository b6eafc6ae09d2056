//! Beacon Relay Server
//!
//! A standalone relay that accepts WebSocket connections and rebroadcasts
//! game-world event messages to every connected peer.

use anyhow::Result;
use beacon_relay::{Relay, RelayConfig};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "beacon-relay")]
#[command(about = "Beacon Relay Server")]
#[command(version)]
struct Cli {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8080")]
    listen: SocketAddr,

    /// Server name used in logs
    #[arg(short, long, default_value = "Beacon Relay")]
    name: String,

    /// Suppress the error reply to malformed frames
    #[arg(long)]
    quiet_malformed: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("Starting {}", cli.name);
    tracing::info!("Listening on: ws://{}", cli.listen);

    let config = RelayConfig {
        name: cli.name,
        reply_on_malformed: !cli.quiet_malformed,
    };

    let relay = Arc::new(Relay::new(config));
    relay.serve_websocket(&cli.listen.to_string()).await?;

    Ok(())
}
