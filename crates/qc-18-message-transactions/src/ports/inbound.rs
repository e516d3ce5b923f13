//! Driving ports: the API other subsystems call.

use crate::domain::MessageTransaction;
use crate::error::Result;
use shared_types::{Block, Hash, Transaction};

/// Block processing for the active chain.
pub trait MessageChainApi: Send + Sync {
    /// Submit a candidate block.
    ///
    /// `Ok(None)` on acceptance, `Ok(Some(reason))` with the exact reject
    /// identifier on a consensus violation, `Err` on infrastructure failure.
    fn submit_block(&self, block: Block) -> Result<Option<&'static str>>;

    /// Remove the tip block.
    fn disconnect_tip(&self) -> Result<Block>;

    /// Switch to a branch forking after `fork_height`.
    fn reorganize(&self, fork_height: u64, branch: Vec<Block>) -> Result<()>;

    /// Cheap admission check for relay: payload shape and work only.
    fn check_for_relay(&self, tx: &Transaction) -> Result<MessageTransaction>;

    /// Is `txid` confirmed within the recent window.
    fn is_recent(&self, txid: &Hash) -> bool;

    /// Height and hash of the active tip.
    fn tip(&self) -> Result<(u64, Hash)>;
}
