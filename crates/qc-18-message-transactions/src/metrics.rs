//! Metrics collection for the message transaction subsystem

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for block processing
#[derive(Debug, Default)]
pub struct Metrics {
    /// Blocks appended to the active chain
    pub blocks_connected: AtomicU64,

    /// Blocks removed from the active chain
    pub blocks_disconnected: AtomicU64,

    /// Blocks refused by a consensus rule
    pub blocks_rejected: AtomicU64,

    /// Message transactions confirmed
    pub message_txs_accepted: AtomicU64,

    /// Completed reorganizations
    pub reorgs: AtomicU64,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connected block and its message transaction count
    pub fn record_connected(&self, message_txs: usize) {
        self.blocks_connected.fetch_add(1, Ordering::Relaxed);
        self.message_txs_accepted
            .fetch_add(message_txs as u64, Ordering::Relaxed);
    }

    /// Record a disconnected block
    pub fn record_disconnected(&self) {
        self.blocks_disconnected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected block
    pub fn record_rejected(&self) {
        self.blocks_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed reorganization
    pub fn record_reorg(&self) {
        self.reorgs.fetch_add(1, Ordering::Relaxed);
    }

    /// Get blocks connected
    pub fn get_blocks_connected(&self) -> u64 {
        self.blocks_connected.load(Ordering::Relaxed)
    }

    /// Get blocks rejected
    pub fn get_blocks_rejected(&self) -> u64 {
        self.blocks_rejected.load(Ordering::Relaxed)
    }

    /// Get message transactions accepted
    pub fn get_message_txs_accepted(&self) -> u64 {
        self.message_txs_accepted.load(Ordering::Relaxed)
    }
}
