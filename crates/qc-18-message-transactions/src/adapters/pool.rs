//! Relay pool for unconfirmed message transactions.

use crate::domain::{anchor_hash32, message_ids, MessageTransaction};
use crate::error::{MsgTxnError, Result};
use crate::ports::ChainListener;
use parking_lot::RwLock;
use shared_types::{Block, Hash, Transaction};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug, Default)]
struct PoolState {
    next_seq: u64,
    arrival: BTreeMap<u64, Hash>,
    entries: HashMap<Hash, (u64, MessageTransaction)>,
}

impl PoolState {
    fn remove(&mut self, id: &Hash) -> bool {
        match self.entries.remove(id) {
            Some((seq, _)) => {
                self.arrival.remove(&seq);
                true
            }
            None => false,
        }
    }
}

/// Message transactions admitted for relay, in arrival order.
///
/// Admission checks (shape and work) are the caller's job. See
/// `MessageChainService::check_for_relay`.
#[derive(Debug)]
pub struct MessagePool {
    capacity: usize,
    state: RwLock<PoolState>,
}

impl MessagePool {
    /// Empty pool holding at most `capacity` transactions.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: RwLock::new(PoolState::default()),
        }
    }

    /// Add a transaction. Returns `false` if it was already pooled.
    ///
    /// # Errors
    ///
    /// `PoolFull` when at capacity.
    pub fn insert(&self, msg: MessageTransaction) -> Result<bool> {
        let mut state = self.state.write();
        let id = msg.id();
        if state.entries.contains_key(&id) {
            return Ok(false);
        }
        if state.entries.len() >= self.capacity {
            return Err(MsgTxnError::PoolFull(self.capacity));
        }
        let seq = state.next_seq;
        state.next_seq += 1;
        state.arrival.insert(seq, id);
        state.entries.insert(id, (seq, msg));
        Ok(true)
    }

    /// Is `id` pooled.
    pub fn contains(&self, id: &Hash) -> bool {
        self.state.read().entries.contains_key(id)
    }

    /// Pooled transaction count.
    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    /// True if nothing is pooled.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Transactions anchored to the block that a new block at `height`
    /// would build on, in arrival order.
    pub fn select_for_block(&self, height: u64, parent_hash: &Hash) -> Vec<Transaction> {
        let anchor = height.saturating_sub(1);
        let hash32 = anchor_hash32(parent_hash);
        let state = self.state.read();
        state
            .arrival
            .values()
            .filter_map(|id| state.entries.get(id))
            .filter(|(_, msg)| {
                u64::from(msg.payload().anchor_height) == anchor
                    && msg.payload().anchor_hash32 == hash32
            })
            .map(|(_, msg)| msg.transaction().clone())
            .collect()
    }

    /// Drop transactions confirmed by `block` and those whose anchor can no
    /// longer be the parent of the next block.
    pub fn prune_for(&self, block: &Block) {
        let mut state = self.state.write();
        let mut removed = 0usize;
        for id in message_ids(block) {
            if state.remove(&id) {
                removed += 1;
            }
        }
        let stale: Vec<Hash> = state
            .entries
            .iter()
            .filter(|(_, (_, msg))| u64::from(msg.payload().anchor_height) < block.height())
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            state.remove(id);
        }
        if removed + stale.len() > 0 {
            debug!(
                "[qc-18] Pool pruned at height {}: {} confirmed, {} stale",
                block.height(),
                removed,
                stale.len()
            );
        }
    }
}

impl ChainListener for MessagePool {
    fn block_connected(&self, block: &Block) {
        self.prune_for(block);
    }

    fn block_disconnected(&self, _block: &Block) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MessagePayload, MESSAGE_CIPHERTEXT_LEN};

    fn msg(anchor_height: u32, parent: &Hash, tag: u8) -> MessageTransaction {
        let payload = MessagePayload::new(
            anchor_height,
            anchor_hash32(parent),
            0,
            vec![tag; MESSAGE_CIPHERTEXT_LEN],
        )
        .unwrap();
        MessageTransaction::from_transaction(MessageTransaction::template(&payload)).unwrap()
    }

    #[test]
    fn test_insert_dedups_and_bounds() {
        let pool = MessagePool::new(2);
        let parent = [1u8; 32];
        assert!(pool.insert(msg(4, &parent, 1)).unwrap());
        assert!(!pool.insert(msg(4, &parent, 1)).unwrap());
        assert!(pool.insert(msg(4, &parent, 2)).unwrap());
        assert!(matches!(
            pool.insert(msg(4, &parent, 3)),
            Err(MsgTxnError::PoolFull(2))
        ));
    }

    #[test]
    fn test_selection_filters_anchor_and_keeps_order() {
        let pool = MessagePool::new(10);
        let parent = [1u8; 32];
        let first = msg(4, &parent, 1);
        let other_anchor = msg(3, &parent, 2);
        let second = msg(4, &parent, 3);
        pool.insert(first.clone()).unwrap();
        pool.insert(other_anchor).unwrap();
        pool.insert(second.clone()).unwrap();

        let selected = pool.select_for_block(5, &parent);
        assert_eq!(selected, vec![first.into_transaction(), second.into_transaction()]);
    }

    #[test]
    fn test_prune_removes_confirmed_and_stale() {
        let pool = MessagePool::new(10);
        let parent = [1u8; 32];
        let confirmed = msg(4, &parent, 1);
        let stale = msg(3, &parent, 2);
        let fresh = msg(5, &parent, 3);
        for m in [&confirmed, &stale, &fresh] {
            pool.insert(m.clone()).unwrap();
        }

        let block = Block::new(
            parent,
            5,
            0,
            vec![
                Transaction::coinbase(5, 50, vec![]),
                confirmed.transaction().clone(),
            ],
        );
        pool.block_connected(&block);

        assert!(!pool.contains(&confirmed.id()));
        assert!(!pool.contains(&stale.id()));
        assert!(pool.contains(&fresh.id()));
    }
}
