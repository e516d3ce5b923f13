//! Driven ports: chain storage and block notifications.

use shared_types::{Block, Hash, TxLocation};

/// Read access to the active chain.
///
/// Lookups only see the active chain. Blocks disconnected by a
/// reorganization are no longer visible.
pub trait ChainReader: Send + Sync {
    /// Height and hash of the active tip.
    fn tip(&self) -> Result<(u64, Hash), ChainStoreError>;

    /// Hash of the active block at `height`.
    fn block_hash_at(&self, height: u64) -> Result<Option<Hash>, ChainStoreError>;

    /// Active block at `height`.
    fn block_at(&self, height: u64) -> Result<Option<Block>, ChainStoreError>;

    /// Where `txid` was confirmed on the active chain.
    fn find_transaction(&self, txid: &Hash) -> Result<Option<TxLocation>, ChainStoreError>;
}

/// Mutable active chain.
pub trait ChainStore: ChainReader {
    /// Append a block on top of the tip.
    fn append(&self, block: Block) -> Result<(), ChainStoreError>;

    /// Remove and return the tip block. Genesis cannot be removed.
    fn pop_tip(&self) -> Result<Block, ChainStoreError>;
}

/// Receives active-chain changes after they are applied.
pub trait ChainListener: Send + Sync {
    /// `block` became the new tip.
    fn block_connected(&self, block: &Block);

    /// `block` was removed from the tip.
    fn block_disconnected(&self, block: &Block);
}

/// Chain store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainStoreError {
    /// Block does not extend the tip.
    NotConnected { expected_height: u64, got: u64 },
    /// Block parent is not the tip hash.
    ParentMismatch { height: u64 },
    /// Attempt to remove the genesis block.
    CannotRemoveGenesis,
    /// Store holds no blocks.
    Empty,
    /// Underlying storage failure.
    Backend(String),
}

impl std::fmt::Display for ChainStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConnected { expected_height, got } => write!(
                f,
                "Block at height {} does not extend tip (expected {})",
                got, expected_height
            ),
            Self::ParentMismatch { height } => {
                write!(f, "Parent hash mismatch at height {}", height)
            }
            Self::CannotRemoveGenesis => write!(f, "Cannot remove genesis block"),
            Self::Empty => write!(f, "Chain store is empty"),
            Self::Backend(message) => write!(f, "Storage error: {}", message),
        }
    }
}

impl std::error::Error for ChainStoreError {}
