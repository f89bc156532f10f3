//! Tarn node binary.
//!
//! Starts a full node with RocksDB chain storage and the static-neighbor
//! TCP sync protocol.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tarn_node::config::NodeConfig;
use tarn_node::node::Node;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "tarn-node", version, about = "Tarn node with durable chain storage")]
struct Args {
    /// Data directory for chain storage.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Path to the node's JSON configuration file.
    #[arg(long, default_value = "./config/config.json")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json").
    #[arg(long, default_value = "text")]
    log_format: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level, &args.log_format);

    info!("Tarn node v{}", env!("CARGO_PKG_VERSION"));

    let default_data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tarn");
    let data_dir = args.data_dir.unwrap_or(default_data_dir);

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        error!("failed to create data_dir: {}", e);
        process::exit(1);
    }

    let config = match NodeConfig::from_file(&args.config, data_dir.clone(), args.log_level.clone()) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("failed to load config: {}", e);
            process::exit(1);
        }
    };

    info!("data_dir: {:?}", config.data_dir);
    info!("local_node: {}", config.local_address);
    info!("neighbor_nodes: {:?}", config.neighbor_addresses);

    let node = match Node::new(config) {
        Ok(n) => Arc::new(n),
        Err(e) => {
            error!("failed to start node: {}", e);
            process::exit(1);
        }
    };

    info!("chain depth: {}", node.store.depth());
    info!("Tarn node running (Ctrl+C to stop)");

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
        info!("received Ctrl+C, shutting down...");
    };

    tokio::select! {
        _ = node.run() => {
            info!("node event loop exited");
        }
        _ = shutdown_signal => {
            info!("shutdown signal received");
        }
    }

    info!("Tarn node shutdown complete");
}

/// Initializes the tracing subscriber with the given log level and output
/// format. Pass `format = "json"` for structured JSON output.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
