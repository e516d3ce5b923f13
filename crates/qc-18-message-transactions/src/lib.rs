//! # Quantum Chain - Message Transactions (Subsystem 18)
//!
//! **Bounded Context:** Proof-of-work paid on-chain messages
//! **Architecture Compliance:** DDD + Hexagonal + TDD
//!
//! ## Purpose
//!
//! Lets anyone deliver an encrypted message by embedding it in a specially
//! shaped transaction. The sender pays in computation instead of coins:
//!
//! - A fixed binary payload (magic, anchor, nonce, ciphertext) is carried in
//!   a single data-carrier output
//! - The required work scales with the transaction's serialized cost
//! - Each message binds to the parent of the block that includes it
//! - A message id is single-use across the whole active chain
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters (Outer)                                   │
//! │  - InMemoryChainStore / FileChainStore              │
//! │  - MessagePool (relay, pruned on connect)           │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Ports (Middle)                                     │
//! │  - Inbound: MessageChainApi                         │
//! │  - Outbound: ChainReader, ChainStore, ChainListener │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain (Inner - Pure Logic)                        │
//! │  - MessagePayload codec                             │
//! │  - TargetCalculator, PowMiner                       │
//! │  - MessageTxValidator, RecentTxIndex                │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Block Acceptance Rules
//!
//! For every message transaction in a candidate block at height `h`, in
//! this order:
//!
//! | Check | Reject identifier |
//! |-------|-------------------|
//! | `pow_hash <= target(cost)` | `msg-txn-hash-above-target` |
//! | id unique in block | `duplicate-msg-txns-in-block` |
//! | id not in last `W` blocks | `msg-txn-among-recent` |
//! | id not earlier on active chain | `msg-txn-too-old` |
//! | anchor height `< h` | `msg-txn-with-bad-prev-block` |
//! | anchor is exactly block `h - 1` | `msg-txn-bad-prev-block-hash` |
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let store = Arc::new(InMemoryChainStore::with_genesis());
//! let service = MessageChainService::new(store, MessageTxnConfig::regtest())?;
//! match service.submit_block(block)? {
//!     None => println!("accepted"),
//!     Some(reason) => println!("rejected: {reason}"),
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Chain store and pool adapters
pub mod adapters;
/// Domain models and consensus rules
pub mod domain;
pub mod ports;
pub mod service;

mod config;
mod error;
mod metrics;

pub use config::{MessageTxnConfig, Network};
pub use error::{MsgTxnError, RejectReason, Result};
pub use metrics::Metrics;

pub use domain::{
    anchor_hash32, message_ids, pow_hash, CancelToken, MessagePayload, MessageTransaction,
    MessageTxValidator, PowMiner, RecentTxIndex, TargetCalculator, MAGIC, MESSAGE_CIPHERTEXT_LEN,
    PAYLOAD_LEN,
};

pub use adapters::{FileChainStore, InMemoryChainStore, MessagePool};
pub use ports::{ChainListener, ChainReader, ChainStore, ChainStoreError, MessageChainApi};
pub use service::MessageChainService;

/// Subsystem identifier
pub const SUBSYSTEM_ID: u8 = 18;

/// Replay window `W`: blocks whose message ids are held in the recent index
pub const MSG_TXN_ACCEPTED_DEPTH: u64 = 6;

/// Reference block reward `S` (50 coins of 10^8 base units)
pub const DEFAULT_BLOCK_REWARD: u64 = 5_000_000_000;

/// Cost units per serialized byte
pub const FEE_PER_BYTE: u64 = 10;

/// Default relay pool capacity
pub const DEFAULT_POOL_CAPACITY: usize = 5_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_length_constant() {
        assert_eq!(PAYLOAD_LEN, 8 + 4 + 4 + 4 + MESSAGE_CIPHERTEXT_LEN);
    }

    #[test]
    fn test_default_config_uses_constants() {
        let config = MessageTxnConfig::default();
        assert_eq!(config.accepted_depth, MSG_TXN_ACCEPTED_DEPTH);
        assert_eq!(config.block_reward, DEFAULT_BLOCK_REWARD);
    }
}
