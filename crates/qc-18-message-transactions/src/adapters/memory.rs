//! In-memory chain store.
//!
//! Holds the active chain as a vector indexed by height plus a transaction
//! location map. Used by tests, and wrapped by the file store at runtime.

use crate::ports::{ChainReader, ChainStore, ChainStoreError};
use parking_lot::RwLock;
use shared_types::{Block, Hash, TxLocation, ZERO_HASH};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct ChainState {
    blocks: Vec<Block>,
    hashes: Vec<Hash>,
    tx_index: HashMap<Hash, TxLocation>,
}

impl ChainState {
    fn push(&mut self, block: Block) {
        let hash = block.hash();
        let height = block.height();
        for (i, tx) in block.transactions.iter().enumerate() {
            self.tx_index.entry(tx.hash()).or_insert(TxLocation {
                block_height: height,
                block_hash: hash,
                tx_index: i as u32,
            });
        }
        self.hashes.push(hash);
        self.blocks.push(block);
    }

    fn pop(&mut self) -> Option<Block> {
        let block = self.blocks.pop()?;
        let height = block.height();
        self.hashes.pop();
        for tx in &block.transactions {
            let txid = tx.hash();
            if self.tx_index.get(&txid).map(|l| l.block_height) == Some(height) {
                self.tx_index.remove(&txid);
            }
        }
        Some(block)
    }
}

/// Active chain held in memory.
#[derive(Debug, Default)]
pub struct InMemoryChainStore {
    state: RwLock<ChainState>,
}

impl InMemoryChainStore {
    /// Store containing only the genesis block.
    pub fn with_genesis() -> Self {
        let store = Self::default();
        store.state.write().push(Block::genesis());
        store
    }

    /// Store seeded with already-validated blocks, genesis first.
    pub fn from_blocks(blocks: impl IntoIterator<Item = Block>) -> Result<Self, ChainStoreError> {
        let store = Self::default();
        for block in blocks {
            store.append(block)?;
        }
        Ok(store)
    }

    /// Number of blocks, genesis included.
    pub fn len(&self) -> usize {
        self.state.read().blocks.len()
    }

    /// True if no block (not even genesis) is stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ChainReader for InMemoryChainStore {
    fn tip(&self) -> Result<(u64, Hash), ChainStoreError> {
        let state = self.state.read();
        let hash = state.hashes.last().copied().ok_or(ChainStoreError::Empty)?;
        Ok((state.hashes.len() as u64 - 1, hash))
    }

    fn block_hash_at(&self, height: u64) -> Result<Option<Hash>, ChainStoreError> {
        Ok(self.state.read().hashes.get(height as usize).copied())
    }

    fn block_at(&self, height: u64) -> Result<Option<Block>, ChainStoreError> {
        Ok(self.state.read().blocks.get(height as usize).cloned())
    }

    fn find_transaction(&self, txid: &Hash) -> Result<Option<TxLocation>, ChainStoreError> {
        Ok(self.state.read().tx_index.get(txid).copied())
    }
}

impl ChainStore for InMemoryChainStore {
    fn append(&self, block: Block) -> Result<(), ChainStoreError> {
        let mut state = self.state.write();
        let expected_height = state.blocks.len() as u64;
        if block.height() != expected_height {
            return Err(ChainStoreError::NotConnected {
                expected_height,
                got: block.height(),
            });
        }
        let parent = state.hashes.last().copied().unwrap_or(ZERO_HASH);
        if block.header.parent_hash != parent {
            return Err(ChainStoreError::ParentMismatch {
                height: block.height(),
            });
        }
        state.push(block);
        Ok(())
    }

    fn pop_tip(&self) -> Result<Block, ChainStoreError> {
        let mut state = self.state.write();
        match state.blocks.len() {
            0 => Err(ChainStoreError::Empty),
            1 => Err(ChainStoreError::CannotRemoveGenesis),
            _ => state.pop().ok_or(ChainStoreError::Empty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::Transaction;

    fn child(store: &InMemoryChainStore, payee: u8) -> Block {
        let (height, hash) = store.tip().unwrap();
        Block::new(
            hash,
            height + 1,
            height + 1,
            vec![Transaction::coinbase(height + 1, 50, vec![payee])],
        )
    }

    #[test]
    fn test_append_and_lookup() {
        let store = InMemoryChainStore::with_genesis();
        let block = child(&store, 1);
        let coinbase = block.transactions[0].hash();
        store.append(block.clone()).unwrap();

        assert_eq!(store.tip().unwrap(), (1, block.hash()));
        assert_eq!(store.block_hash_at(1).unwrap(), Some(block.hash()));
        let location = store.find_transaction(&coinbase).unwrap().unwrap();
        assert_eq!(location.block_height, 1);
        assert_eq!(location.tx_index, 0);
    }

    #[test]
    fn test_rejects_unlinked_blocks() {
        let store = InMemoryChainStore::with_genesis();
        let mut block = child(&store, 1);
        block.header.parent_hash = [9u8; 32];
        assert_eq!(
            store.append(block),
            Err(ChainStoreError::ParentMismatch { height: 1 })
        );

        let mut skip = child(&store, 1);
        skip.header.height = 5;
        assert!(matches!(
            store.append(skip),
            Err(ChainStoreError::NotConnected { expected_height: 1, got: 5 })
        ));
    }

    #[test]
    fn test_pop_forgets_transactions() {
        let store = InMemoryChainStore::with_genesis();
        let block = child(&store, 1);
        let coinbase = block.transactions[0].hash();
        store.append(block).unwrap();

        store.pop_tip().unwrap();
        assert_eq!(store.find_transaction(&coinbase).unwrap(), None);
        assert_eq!(store.pop_tip(), Err(ChainStoreError::CannotRemoveGenesis));
    }
}
