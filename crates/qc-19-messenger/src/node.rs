//! Single-node wiring: chain store, chain service, relay pool and messenger.

use crate::adapters::{Inbox, KeyStore, KEYSTORE_FILE};
use crate::error::{MessengerError, Result};
use crate::service::Messenger;
use qc_18_message_transactions::{
    ChainStore, FileChainStore, InMemoryChainStore, MessageChainApi,
    MessageChainService, MessagePool, MessageTxnConfig,
};
use shared_types::{Block, Transaction, GENESIS_TIMESTAMP};
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Directory under the data dir holding block files
pub const BLOCKS_DIR: &str = "blocks";

/// A messaging node: everything needed to send, mine and read messages.
pub struct MessengerNode {
    service: Arc<MessageChainService>,
    pool: Arc<MessagePool>,
    messenger: Messenger,
}

impl MessengerNode {
    /// Open (or create) a node persisted under `data_dir`.
    pub fn open<P: AsRef<Path>>(data_dir: P, config: MessageTxnConfig) -> Result<Self> {
        Self::open_with_passphrase(data_dir, None, config)
    }

    /// [`open`](Self::open), unlocking an encrypted key store with
    /// `passphrase`.
    pub fn open_with_passphrase<P: AsRef<Path>>(
        data_dir: P,
        passphrase: Option<&str>,
        config: MessageTxnConfig,
    ) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        info!("[qc-19] Opening node at {}", data_dir.display());
        let keys = KeyStore::open_with_passphrase(data_dir.join(KEYSTORE_FILE), passphrase)?;
        let store = FileChainStore::open(data_dir.join(BLOCKS_DIR))?;
        Self::assemble(Arc::new(store), keys, config)
    }

    /// Node with an in-memory chain and the key store at `keystore_path`.
    pub fn in_memory<P: AsRef<Path>>(keystore_path: P, config: MessageTxnConfig) -> Result<Self> {
        let keys = KeyStore::open(keystore_path)?;
        Self::assemble(Arc::new(InMemoryChainStore::with_genesis()), keys, config)
    }

    fn assemble(
        store: Arc<dyn ChainStore>,
        keys: KeyStore,
        config: MessageTxnConfig,
    ) -> Result<Self> {
        let pool = Arc::new(MessagePool::new(config.pool_capacity));
        let service = Arc::new(MessageChainService::new(store, config)?);
        service.subscribe(pool.clone());

        let keys = Arc::new(keys);
        let inbox = Arc::new(Inbox::new(keys.clone()));
        inbox.rescan(&**service.store())?;

        let messenger = Messenger::new(service.clone(), pool.clone(), keys, inbox);
        Ok(Self {
            service,
            pool,
            messenger,
        })
    }

    /// Messenger operations.
    pub fn messenger(&self) -> &Messenger {
        &self.messenger
    }

    /// Block processing service.
    pub fn service(&self) -> &Arc<MessageChainService> {
        &self.service
    }

    /// Relay pool.
    pub fn pool(&self) -> &Arc<MessagePool> {
        &self.pool
    }

    /// Submit a block from elsewhere; `None` means accepted.
    pub fn submit_block(&self, block: Block) -> Result<Option<&'static str>> {
        Ok(self.service.submit_block(block)?)
    }

    /// Assemble and connect `n` blocks paying the active key, each carrying
    /// the pooled message transactions anchored at its parent.
    pub fn generate(&self, n: usize) -> Result<Vec<Block>> {
        let mut blocks = Vec::with_capacity(n);
        for _ in 0..n {
            let block = self.assemble_block()?;
            if let Some(reason) = self.service.submit_block(block.clone())? {
                return Err(MessengerError::BlockRejected(reason));
            }
            info!(
                "[qc-19] Generated block {} with {} transactions",
                block.height(),
                block.transactions.len()
            );
            blocks.push(block);
        }
        Ok(blocks)
    }

    fn assemble_block(&self) -> Result<Block> {
        let store = self.service.store();
        let (height, parent_hash) = store.tip()?;
        let parent_time = store
            .block_at(height)?
            .map_or(GENESIS_TIMESTAMP, |b| b.header.timestamp);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(GENESIS_TIMESTAMP, |d| d.as_secs());

        let payee = self.messenger.get_active_key().as_bytes().to_vec();
        let mut txs = vec![Transaction::coinbase(
            height + 1,
            self.service.config().block_reward,
            payee,
        )];
        txs.extend(self.pool.select_for_block(height + 1, &parent_hash));
        Ok(Block::new(parent_hash, height + 1, now.max(parent_time + 1), txs))
    }
}
