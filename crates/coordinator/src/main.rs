//! agentnet binary.
//!
//! Usage:
//!   agentnet
//!   agentnet --config agentnet.toml
//!
//! # Environment Variables
//!
//! - `ANTHROPIC_API_KEY` - API key for the reasoning service (recommended)
//! - `RUST_LOG` - log filter (default: info,agentnet=debug)

use agentnet_coordinator::{Network, NetworkConfig};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,agentnet=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let mut config_path: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    anyhow::bail!("--config needs a file path");
                }
            }
            "--help" | "-h" => {
                println!("agentnet - multi-agent coordination network");
                println!();
                println!("Usage: agentnet [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --config <FILE>      Path to a TOML config file");
                println!("  -h, --help               Show this help message");
                println!();
                println!("Environment variables:");
                println!("  ANTHROPIC_API_KEY        API key for the reasoning service");
                println!("  RUST_LOG                 Log filter (default: info,agentnet=debug)");
                return Ok(());
            }
            other => {
                tracing::warn!("Ignoring unknown argument: {other}");
            }
        }
        i += 1;
    }

    let config = match &config_path {
        Some(path) => {
            info!("Loading config from {path}");
            NetworkConfig::from_file(path)?
        }
        None => {
            info!("No config file given, using defaults");
            NetworkConfig::default()
        }
    };

    let network = Network::new(config).await?;
    network.broadcast("agentnet online");

    let run = network.start();
    tokio::pin!(run);

    tokio::select! {
        result = &mut run => {
            result?;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Ctrl-C received, shutting down");
            network.broadcast("agentnet shutting down");
            network.stop();
        }
    }

    run.await?;
    info!("Shutdown complete");
    Ok(())
}
