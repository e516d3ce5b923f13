//! Block acceptance rules for message transactions.
//!
//! Every recognized message transaction of a candidate block is checked in
//! block order. The first violation rejects the whole block:
//!
//! 1. work: `pow_hash <= target(cost)`
//! 2. no id twice in the block
//! 3. no id confirmed in the recent window, nor earlier on the active chain
//! 4. anchor height: not above the parent of the block
//! 5. anchor hash: must name the parent; any lower height fails here
//!
//! Replay checks run before anchor checks. A copy of a confirmed message
//! always carries a stale anchor, so the other order would report every
//! replay as `msg-txn-bad-prev-block-hash`.

use super::message_tx::{message_transactions, MessageTransaction};
use super::recent_index::RecentTxIndex;
use super::target::{anchor_hash32, meets_target, TargetCalculator};
use crate::error::{MsgTxnError, RejectReason, Result};
use crate::ports::ChainReader;
use shared_types::{Block, Hash};
use std::collections::HashSet;
use tracing::debug;

/// Validates the message transactions of candidate blocks.
#[derive(Clone, Debug)]
pub struct MessageTxValidator {
    calculator: TargetCalculator,
}

impl MessageTxValidator {
    /// Validator using `calculator` for work targets.
    pub fn new(calculator: TargetCalculator) -> Self {
        Self { calculator }
    }

    /// Target calculator in use.
    pub fn calculator(&self) -> &TargetCalculator {
        &self.calculator
    }

    /// Shape and work only. Used for relay, where the anchor block is not
    /// yet known.
    pub fn check_work(&self, msg: &MessageTransaction) -> Result<()> {
        let target = msg.target(&self.calculator)?;
        if !meets_target(msg.pow_hash(), target) {
            return Err(MsgTxnError::rejected(RejectReason::HashAboveTarget, msg.id()));
        }
        Ok(())
    }

    /// Anchor rules for inclusion in a block at `height` whose parent hash
    /// is `parent_hash`.
    pub fn check_anchor(&self, msg: &MessageTransaction, height: u64, parent_hash: &Hash) -> Result<()> {
        let payload = msg.payload();
        let expected = height.saturating_sub(1);
        let anchor = u64::from(payload.anchor_height);

        if anchor > expected {
            return Err(MsgTxnError::rejected(RejectReason::BadPrevBlock, msg.id()));
        }
        if anchor < expected || payload.anchor_hash32 != anchor_hash32(parent_hash) {
            return Err(MsgTxnError::rejected(RejectReason::BadPrevBlockHash, msg.id()));
        }
        Ok(())
    }

    /// Validate every message transaction of `block`, which must extend the
    /// tip of `chain`.
    ///
    /// Returns the recognized message transactions in block order.
    pub fn validate_block<C: ChainReader + ?Sized>(
        &self,
        block: &Block,
        chain: &C,
        recent: &RecentTxIndex,
    ) -> Result<Vec<MessageTransaction>> {
        let height = block.height();
        let parent = block.header.parent_hash;
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();

        for msg in message_transactions(block) {
            let id = msg.id();

            self.check_work(&msg)?;

            if !seen.insert(id) {
                return Err(MsgTxnError::rejected(RejectReason::DuplicateInBlock, id));
            }

            if recent.contains(&id) {
                return Err(MsgTxnError::rejected(RejectReason::AmongRecent, id));
            }
            if let Some(location) = chain.find_transaction(&id)? {
                debug!(
                    "[qc-18] Replay of {} first confirmed at height {}",
                    hex::encode(id),
                    location.block_height
                );
                return Err(MsgTxnError::rejected(RejectReason::TooOld, id));
            }

            self.check_anchor(&msg, height, &parent)?;
            accepted.push(msg);
        }

        Ok(accepted)
    }
}
