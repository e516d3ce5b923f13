//! Node runtime: owns the messaging node and the block producer task.

use crate::config::NodeConfig;
use anyhow::{Context, Result};
use qc_19_messenger::MessengerNode;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// The running node.
pub struct NodeRuntime {
    node: Arc<MessengerNode>,
    config: NodeConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    producer: Mutex<Option<JoinHandle<()>>>,
}

impl NodeRuntime {
    /// Open the data directory. Fails if the key store is unreadable.
    ///
    /// ## Startup Sequence
    ///
    /// 1. Create the data directory if missing
    /// 2. Open the key store (fatal if corrupt or still locked)
    /// 3. Open the chain store and rebuild the recent index
    /// 4. Rescan the chain into the inbox
    pub fn new(config: NodeConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create data dir {}", config.data_dir.display()))?;
        let node = MessengerNode::open_with_passphrase(
            &config.data_dir,
            config.key_passphrase.as_deref(),
            config.message_config(),
        )
        .context("Failed to open messaging node")?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Ok(Self {
            node: Arc::new(node),
            config,
            shutdown_tx,
            shutdown_rx,
            producer: Mutex::new(None),
        })
    }

    /// Log node identity and start producing blocks.
    pub async fn start(&self) -> Result<()> {
        let (height, hash) = self.node.service().store().tip()?;
        info!("===========================================");
        info!("  Message Transaction Node v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!("Network: {:?}", self.config.network);
        info!("Data Dir: {}", self.config.data_dir.display());
        info!("Tip: {} ({})", height, hex::encode(&hash[..8]));
        info!("Message key: {}", self.node.messenger().get_active_key());
        info!("Key store encrypted: {}", self.node.messenger().keys().is_encrypted());
        info!("Block interval: {:?}", self.config.block_interval);

        let handle = self.spawn_producer();
        *self.producer.lock().await = Some(handle);
        Ok(())
    }

    fn spawn_producer(&self) -> JoinHandle<()> {
        let node = Arc::clone(&self.node);
        let mut shutdown = self.shutdown_rx.clone();
        let mut ticker = tokio::time::interval(self.config.block_interval);

        tokio::spawn(async move {
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let node = Arc::clone(&node);
                        match tokio::task::spawn_blocking(move || node.generate(1)).await {
                            Ok(Ok(_)) => {}
                            Ok(Err(e)) => warn!("[qc-19] Block generation failed: {}", e),
                            Err(e) => {
                                error!("[qc-19] Block producer panicked: {}", e);
                                break;
                            }
                        }
                    }
                    _ = shutdown.changed() => {
                        info!("[qc-19] Shutdown signal received");
                        break;
                    }
                }
            }
        })
    }

    /// Stop the producer and wait for the block in progress.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
        if let Some(handle) = self.producer.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Block producer ended abnormally: {}", e);
            }
        }
        info!("Shutdown complete");
    }

    /// The messaging node.
    pub fn node(&self) -> &Arc<MessengerNode> {
        &self.node
    }
}
