//! Recent message transaction index.
//!
//! Holds the message transaction ids confirmed in the last `W` blocks of the
//! active chain, tagged with their confirming height. With tip `t` the
//! window is `t - W + 1 ..= t`.
//!
//! The index owns its synchronization. Mutation must still be serialized
//! with tip updates by the caller so the window always matches the chain.

use super::message_tx::message_ids;
use parking_lot::RwLock;
use shared_types::{Block, Hash};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Default)]
struct IndexState {
    by_id: HashMap<Hash, u64>,
    by_height: BTreeMap<u64, Vec<Hash>>,
}

impl IndexState {
    fn insert(&mut self, height: u64, ids: Vec<Hash>) {
        for id in &ids {
            self.by_id.insert(*id, height);
        }
        if !ids.is_empty() {
            self.by_height.entry(height).or_default().extend(ids);
        }
    }

    fn remove_height(&mut self, height: u64) {
        if let Some(ids) = self.by_height.remove(&height) {
            for id in ids {
                if self.by_id.get(&id) == Some(&height) {
                    self.by_id.remove(&id);
                }
            }
        }
    }

    fn evict_through(&mut self, height: u64) {
        let stale: Vec<u64> = self.by_height.range(..=height).map(|(h, _)| *h).collect();
        for h in stale {
            self.remove_height(h);
        }
    }
}

/// Bounded, chain-aware set of recently confirmed message transaction ids.
#[derive(Debug)]
pub struct RecentTxIndex {
    depth: u64,
    state: RwLock<IndexState>,
}

impl RecentTxIndex {
    /// Empty index with window `depth`.
    pub fn new(depth: u64) -> Self {
        Self {
            depth,
            state: RwLock::new(IndexState::default()),
        }
    }

    /// Window size in blocks.
    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Lowest height still inside the window for tip `tip`.
    pub fn window_floor(&self, tip: u64) -> u64 {
        (tip + 1).saturating_sub(self.depth)
    }

    /// Is `id` confirmed within the window.
    pub fn contains(&self, id: &Hash) -> bool {
        self.state.read().by_id.contains_key(id)
    }

    /// Confirming height of `id`, if indexed.
    pub fn confirmed_height(&self, id: &Hash) -> Option<u64> {
        self.state.read().by_id.get(id).copied()
    }

    /// Number of indexed ids.
    pub fn len(&self) -> usize {
        self.state.read().by_id.len()
    }

    /// True if nothing is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lowest and highest heights holding indexed ids.
    pub fn window(&self) -> Option<(u64, u64)> {
        let state = self.state.read();
        let low = state.by_height.keys().next().copied()?;
        let high = state.by_height.keys().next_back().copied()?;
        Some((low, high))
    }

    /// Index a newly connected block and evict what fell out of the window.
    pub fn on_connect(&self, block: &Block) {
        let height = block.height();
        let ids = message_ids(block);
        let mut state = self.state.write();
        state.insert(height, ids);
        if let Some(floor) = self.window_floor(height).checked_sub(1) {
            state.evict_through(floor);
        }
    }

    /// Remove a disconnected block's ids.
    ///
    /// `reentering` is the block at the new window floor, which slides back
    /// into the window once the tip drops by one.
    pub fn on_disconnect(&self, block: &Block, reentering: Option<&Block>) {
        let mut state = self.state.write();
        state.remove_height(block.height());
        if let Some(back) = reentering {
            state.remove_height(back.height());
            state.insert(back.height(), message_ids(back));
        }
    }

    /// Replace the contents with the given blocks (the last `W` of the chain).
    pub fn rebuild<'a>(&self, blocks: impl IntoIterator<Item = &'a Block>) {
        let mut fresh = IndexState::default();
        let mut tip = None;
        for block in blocks {
            fresh.insert(block.height(), message_ids(block));
            tip = Some(tip.map_or(block.height(), |t: u64| t.max(block.height())));
        }
        if let Some(floor) = tip.and_then(|t| self.window_floor(t).checked_sub(1)) {
            fresh.evict_through(floor);
        }
        debug!("[qc-18] Recent index rebuilt: {} ids", fresh.by_id.len());
        *self.state.write() = fresh;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::message_tx::MessageTransaction;
    use crate::domain::payload::{MessagePayload, MESSAGE_CIPHERTEXT_LEN};
    use shared_types::Transaction;

    fn msg_tx(tag: u8) -> Transaction {
        let payload = MessagePayload::new(0, 0, 0, vec![tag; MESSAGE_CIPHERTEXT_LEN]).unwrap();
        MessageTransaction::template(&payload)
    }

    fn block(height: u64, txs: Vec<Transaction>) -> Block {
        let mut all = vec![Transaction::coinbase(height, 50, vec![])];
        all.extend(txs);
        Block::new([0u8; 32], height, height, all)
    }

    #[test]
    fn test_window_holds_last_depth_blocks() {
        let index = RecentTxIndex::new(6);
        let tx = msg_tx(1);
        let id = tx.hash();

        index.on_connect(&block(1, vec![tx]));
        for h in 2..=6 {
            index.on_connect(&block(h, vec![]));
        }
        assert!(index.contains(&id), "tip 6: height 1 still in window");

        index.on_connect(&block(7, vec![]));
        assert!(!index.contains(&id), "tip 7: height 1 evicted");
        assert!(index.is_empty());
    }

    #[test]
    fn test_disconnect_removes_and_backfills() {
        let index = RecentTxIndex::new(2);
        let old = block(1, vec![msg_tx(1)]);
        let mid = block(2, vec![msg_tx(2)]);
        let top = block(3, vec![msg_tx(3)]);

        index.on_connect(&old);
        index.on_connect(&mid);
        index.on_connect(&top);
        assert_eq!(index.window(), Some((2, 3)));

        index.on_disconnect(&top, Some(&old));
        assert_eq!(index.window(), Some((1, 2)));
        assert!(index.contains(&old.transactions[1].hash()));
        assert!(!index.contains(&top.transactions[1].hash()));
    }

    #[test]
    fn test_rebuild_matches_incremental() {
        let blocks: Vec<Block> = (1..=5).map(|h| block(h, vec![msg_tx(h as u8)])).collect();

        let incremental = RecentTxIndex::new(3);
        for b in &blocks {
            incremental.on_connect(b);
        }

        let rebuilt = RecentTxIndex::new(3);
        rebuilt.rebuild(&blocks);

        assert_eq!(rebuilt.len(), incremental.len());
        assert_eq!(rebuilt.window(), incremental.window());
        assert_eq!(rebuilt.confirmed_height(&blocks[4].transactions[1].hash()), Some(5));
    }

    #[test]
    fn test_non_message_transactions_ignored() {
        let index = RecentTxIndex::new(6);
        index.on_connect(&block(1, vec![]));
        assert!(index.is_empty());
        assert_eq!(index.window(), None);
    }
}
