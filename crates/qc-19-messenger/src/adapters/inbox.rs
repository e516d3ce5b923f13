//! Inbox of decrypted messages
//!
//! Follows the active chain through [`ChainListener`] notifications. Every
//! message transaction in a connected block is trial-decrypted with each
//! local key; envelopes that open and verify are kept, everything else is
//! somebody else's mail.

use crate::adapters::KeyStore;
use crate::domain::{MessageEnvelope, ReceivedMessage};
use crate::error::Result;
use parking_lot::RwLock;
use qc_18_message_transactions::{ChainListener, ChainReader, MessageTransaction};
use rayon::prelude::*;
use shared_crypto::Secp256k1KeyPair;
use shared_types::{Block, Hash};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Default)]
struct InboxState {
    by_txid: HashMap<Hash, ReceivedMessage>,
    /// Commitment order
    order: BTreeMap<(u64, u32), Hash>,
}

impl InboxState {
    fn insert(&mut self, msg: ReceivedMessage) {
        if let Some(old) = self.by_txid.insert(msg.txid, msg.clone()) {
            self.order.remove(&old.position());
        }
        self.order.insert(msg.position(), msg.txid);
    }
}

/// Messages addressed to this node's keys.
pub struct Inbox {
    keys: Arc<KeyStore>,
    state: RwLock<InboxState>,
}

fn try_open(keys: &[Secp256k1KeyPair], msg: &MessageTransaction) -> Option<(Secp256k1KeyPair, MessageEnvelope)> {
    keys.iter().find_map(|key| {
        MessageEnvelope::open(key, msg.payload().ciphertext())
            .ok()
            .map(|envelope| (key.clone(), envelope))
    })
}

/// Decrypt every message in `block` readable by one of `keys`.
pub fn scan_block(block: &Block, keys: &[Secp256k1KeyPair]) -> Vec<ReceivedMessage> {
    let block_hash = block.hash();
    let height = block.height();
    block
        .transactions
        .par_iter()
        .enumerate()
        .filter_map(|(index, tx)| {
            let msg = MessageTransaction::from_transaction(tx.clone())?;
            let (key, envelope) = try_open(keys, &msg)?;
            Some(ReceivedMessage {
                txid: msg.id(),
                block_height: height,
                block_hash,
                tx_index: index as u32,
                from: envelope.from,
                to: key.public_key(),
                subject: envelope.subject,
                body: envelope.body,
            })
        })
        .collect()
}

impl Inbox {
    /// Empty inbox for the keys in `keys`.
    pub fn new(keys: Arc<KeyStore>) -> Self {
        Self {
            keys,
            state: RwLock::new(InboxState::default()),
        }
    }

    /// Number of messages held.
    pub fn len(&self) -> usize {
        self.state.read().by_txid.len()
    }

    /// True if no messages are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a message by transaction id.
    pub fn get(&self, txid: &Hash) -> Option<ReceivedMessage> {
        self.state.read().by_txid.get(txid).cloned()
    }

    /// Messages confirmed above `after_height` (all if `None`), in
    /// commitment order.
    pub fn list_since(&self, after_height: Option<u64>) -> Vec<ReceivedMessage> {
        let state = self.state.read();
        let start = after_height.map_or(0, |h| h.saturating_add(1));
        state
            .order
            .range((start, 0)..)
            .filter_map(|(_, txid)| state.by_txid.get(txid).cloned())
            .collect()
    }

    /// Rebuild from the whole active chain of `chain`.
    pub fn rescan<C: ChainReader + ?Sized>(&self, chain: &C) -> Result<usize> {
        let keys = self.keys.all_keys();
        let (tip, _) = chain.tip()?;

        let mut fresh = InboxState::default();
        for height in 0..=tip {
            if let Some(block) = chain.block_at(height)? {
                for msg in scan_block(&block, &keys) {
                    fresh.insert(msg);
                }
            }
        }
        let found = fresh.by_txid.len();
        *self.state.write() = fresh;
        info!(
            "[qc-19] Inbox rescanned {} blocks with {} keys: {} messages",
            tip + 1,
            keys.len(),
            found
        );
        Ok(found)
    }
}

impl ChainListener for Inbox {
    fn block_connected(&self, block: &Block) {
        let found = scan_block(block, &self.keys.all_keys());
        if found.is_empty() {
            return;
        }
        debug!(
            "[qc-19] {} new messages in block {}",
            found.len(),
            block.height()
        );
        let mut state = self.state.write();
        for msg in found {
            state.insert(msg);
        }
    }

    fn block_disconnected(&self, block: &Block) {
        let height = block.height();
        let mut state = self.state.write();
        let removed: Vec<_> = state
            .order
            .range((height, 0)..=(height, u32::MAX))
            .map(|(pos, txid)| (*pos, *txid))
            .collect();
        for (pos, txid) in removed {
            state.order.remove(&pos);
            state.by_txid.remove(&txid);
        }
    }
}
