//! Demonstration binary wiring `NodeConfig`, `FileServer` and `TcpTransport`
//! together. Out of scope for correctness — a thin convenience wrapper
//! around the library crates.

#![deny(unsafe_code)]

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nexnet_server::{FileServer, NodeConfig};
use nexnet_store::Store;
use nexnet_transport::{TcpTransport, TransportOpts};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "nexnet-node", about = "Run a nexnet peer-to-peer file store node")]
struct Cli {
    /// Path to a NodeConfig TOML file. Flags below override its fields.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:3000.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Peer addresses to dial on startup. May be repeated.
    #[arg(short, long = "bootstrap")]
    bootstrap: Vec<SocketAddr>,

    /// Storage root directory.
    #[arg(short, long)]
    root: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    nexnet_telemetry::init_logging().ok();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config at {}", path.display()))?;
            NodeConfig::from_toml(&text)?
        }
        None => NodeConfig {
            listen_addr: cli.listen.context("either --config or --listen is required")?,
            bootstrap: vec![],
            root: PathBuf::from("nexnet_network"),
            encryption_key: None,
            node_id: None,
            path_transform: Default::default(),
        },
    };

    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if !cli.bootstrap.is_empty() {
        config.bootstrap = cli.bootstrap;
    }
    if let Some(root) = cli.root {
        config.root = root;
    }
    config.generate_missing();

    let enc_key = config.encryption_key()?;
    let node_id = config.node_id()?;
    let store = Store::new(config.root.clone());
    let transport = TcpTransport::new(TransportOpts::new(config.listen_addr));

    let server = FileServer::new(transport, store, enc_key, node_id);
    server.listen_and_serve().await.context("starting listener")?;
    server.bootstrap(&config.bootstrap).await;

    info!(listen = %config.listen_addr, node_id = server.node_id(), "nexnet node running");

    tokio::signal::ctrl_c().await.context("waiting for shutdown signal")?;
    info!("shutting down");
    Ok(())
}
