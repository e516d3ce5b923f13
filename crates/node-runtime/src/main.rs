//! # Message Transaction Node
//!
//! Single-node development runtime. See the crate manifest for the
//! environment variables it reads.

use anyhow::{Context, Result};
use node_runtime::{NodeConfig, NodeRuntime};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let config = NodeConfig::from_env().context("Invalid configuration")?;
    let runtime = NodeRuntime::new(config)?;
    runtime.start().await?;

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
