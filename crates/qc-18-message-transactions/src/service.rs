//! Message Chain Service
//!
//! Owns the recent transaction index and serializes every change to the
//! active chain (connect, disconnect, reorganize, rebuild) behind one
//! block-processing lock, so index contents always match the tip.

use crate::{
    config::MessageTxnConfig,
    domain::{MessageTransaction, MessageTxValidator, RecentTxIndex, TargetCalculator},
    error::{MsgTxnError, RejectReason, Result},
    metrics::Metrics,
    ports::{ChainListener, ChainStore, MessageChainApi},
};
use parking_lot::{Mutex, RwLock};
use shared_types::{Block, Hash, Transaction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Concrete block processing service for message transactions.
pub struct MessageChainService {
    /// Active chain
    store: Arc<dyn ChainStore>,

    /// Recent message transaction ids
    index: RecentTxIndex,

    /// Consensus rules
    validator: MessageTxValidator,

    /// Block-processing serialization boundary
    process_lock: Mutex<()>,

    /// Notified after every connect/disconnect
    listeners: RwLock<Vec<Arc<dyn ChainListener>>>,

    metrics: Metrics,
    config: MessageTxnConfig,
}

impl MessageChainService {
    /// Create the service and rebuild the recent index from `store`.
    pub fn new(store: Arc<dyn ChainStore>, config: MessageTxnConfig) -> Result<Self> {
        config.validate()?;
        info!("[qc-18] Initializing Message Chain Service");
        info!("  Accepted depth: {}", config.accepted_depth);
        info!("  Base target: {:#x}", config.base_target);

        let service = Self {
            store,
            index: RecentTxIndex::new(config.accepted_depth),
            validator: MessageTxValidator::new(TargetCalculator::from_config(&config)),
            process_lock: Mutex::new(()),
            listeners: RwLock::new(Vec::new()),
            metrics: Metrics::new(),
            config,
        };
        service.rebuild_index()?;
        Ok(service)
    }

    /// Register a listener for chain changes.
    pub fn subscribe(&self, listener: Arc<dyn ChainListener>) {
        self.listeners.write().push(listener);
    }

    /// Replay the last `W` active blocks into the index.
    pub fn rebuild_index(&self) -> Result<()> {
        let _guard = self.process_lock.lock();
        let (tip, _) = self.store.tip()?;
        let floor = self.index.window_floor(tip);

        let mut blocks = Vec::with_capacity((tip - floor + 1) as usize);
        for height in floor..=tip {
            if let Some(block) = self.store.block_at(height)? {
                blocks.push(block);
            }
        }
        self.index.rebuild(&blocks);
        info!(
            "[qc-18] Recent index rebuilt at tip {}: {} ids over heights {}..={}",
            tip,
            self.index.len(),
            floor,
            tip
        );
        Ok(())
    }

    /// Validate and append a block extending the tip.
    #[tracing::instrument(skip_all, fields(height = block.height()))]
    pub fn connect_block(&self, block: Block) -> Result<()> {
        let _guard = self.process_lock.lock();
        let result = self.connect_locked(block);
        if let Err(e) = &result {
            if e.is_consensus() {
                self.metrics.record_rejected();
                warn!("[qc-18] Block rejected: {}", e);
            }
        }
        result
    }

    /// Remove the tip block and roll the index back.
    pub fn disconnect_tip(&self) -> Result<Block> {
        let _guard = self.process_lock.lock();
        self.disconnect_locked()
    }

    /// Switch the active chain to `branch`, which must start at
    /// `fork_height + 1`. On failure the previous chain is restored and the
    /// branch error is returned.
    pub fn reorganize(&self, fork_height: u64, branch: Vec<Block>) -> Result<()> {
        let _guard = self.process_lock.lock();
        let (tip, _) = self.store.tip()?;
        if fork_height > tip {
            return Err(MsgTxnError::ReorgFailed(format!(
                "fork height {fork_height} above tip {tip}"
            )));
        }
        info!(
            "[qc-18] Reorganizing: fork={} old_tip={} new_blocks={}",
            fork_height,
            tip,
            branch.len()
        );

        let mut abandoned = Vec::new();
        while self.store.tip()?.0 > fork_height {
            abandoned.push(self.disconnect_locked()?);
        }

        let mut connected = 0usize;
        let mut failure = None;
        for block in branch {
            match self.connect_locked(block) {
                Ok(()) => connected += 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        let Some(error) = failure else {
            self.metrics.record_reorg();
            return Ok(());
        };

        warn!("[qc-18] Reorganization failed, restoring old branch: {}", error);
        if error.is_consensus() {
            self.metrics.record_rejected();
        }
        for _ in 0..connected {
            self.disconnect_locked()?;
        }
        for block in abandoned.into_iter().rev() {
            self.connect_locked(block)
                .map_err(|e| MsgTxnError::ReorgFailed(format!("restore failed: {e}")))?;
        }
        Err(error)
    }

    /// Run `f` against the store while holding the block-processing lock.
    /// No block connects or disconnects until `f` returns, so `f` must not
    /// call back into this service's chain-changing operations.
    pub fn with_chain_locked<R>(&self, f: impl FnOnce(&dyn ChainStore) -> R) -> R {
        let _guard = self.process_lock.lock();
        f(&*self.store)
    }

    /// Recent index (read-only view).
    pub fn index(&self) -> &RecentTxIndex {
        &self.index
    }

    /// Underlying chain store.
    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    /// Metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration.
    pub fn config(&self) -> &MessageTxnConfig {
        &self.config
    }

    /// Target calculator used for validation.
    pub fn calculator(&self) -> &TargetCalculator {
        self.validator.calculator()
    }

    fn connect_locked(&self, block: Block) -> Result<()> {
        let (tip_height, tip_hash) = self.store.tip()?;
        if block.height() != tip_height + 1 || block.header.parent_hash != tip_hash {
            return Err(MsgTxnError::Rejected {
                reason: RejectReason::BadPrevBlk,
                txid: None,
            });
        }
        if !block.has_valid_tx_root() {
            return Err(MsgTxnError::Rejected {
                reason: RejectReason::BadTxRoot,
                txid: None,
            });
        }

        let accepted = self
            .validator
            .validate_block(&block, &*self.store, &self.index)?;

        self.store.append(block.clone())?;
        self.index.on_connect(&block);
        self.metrics.record_connected(accepted.len());

        debug!(
            "[qc-18] Connected block {} at height {} with {} message txs",
            hex::encode(block.hash()),
            block.height(),
            accepted.len()
        );
        for listener in self.listeners.read().iter() {
            listener.block_connected(&block);
        }
        Ok(())
    }

    fn disconnect_locked(&self) -> Result<Block> {
        let block = self.store.pop_tip()?;
        let (new_tip, _) = self.store.tip()?;

        let floor = self.index.window_floor(new_tip);
        let reentering = if floor + self.index.depth() == new_tip + 1 {
            self.store.block_at(floor)?
        } else {
            None
        };
        self.index.on_disconnect(&block, reentering.as_ref());
        self.metrics.record_disconnected();

        debug!(
            "[qc-18] Disconnected block at height {}, new tip {}",
            block.height(),
            new_tip
        );
        for listener in self.listeners.read().iter() {
            listener.block_disconnected(&block);
        }
        Ok(block)
    }
}

impl MessageChainApi for MessageChainService {
    fn submit_block(&self, block: Block) -> Result<Option<&'static str>> {
        match self.connect_block(block) {
            Ok(()) => Ok(None),
            Err(e) => match e.reject_reason() {
                Some(reason) => Ok(Some(reason.as_str())),
                None => Err(e),
            },
        }
    }

    fn disconnect_tip(&self) -> Result<Block> {
        MessageChainService::disconnect_tip(self)
    }

    fn reorganize(&self, fork_height: u64, branch: Vec<Block>) -> Result<()> {
        MessageChainService::reorganize(self, fork_height, branch)
    }

    fn check_for_relay(&self, tx: &Transaction) -> Result<MessageTransaction> {
        let msg = MessageTransaction::from_transaction(tx.clone())
            .ok_or(MsgTxnError::NotMessageTransaction)?;
        self.validator.check_work(&msg)?;
        Ok(msg)
    }

    fn is_recent(&self, txid: &Hash) -> bool {
        self.index.contains(txid)
    }

    fn tip(&self) -> Result<(u64, Hash)> {
        Ok(self.store.tip()?)
    }
}
