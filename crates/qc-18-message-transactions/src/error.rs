//! Error types for the message transaction subsystem

use crate::ports::outbound::ChainStoreError;
use shared_types::Hash;
use std::fmt;
use thiserror::Error;

/// Result type alias for message transaction operations
pub type Result<T> = std::result::Result<T, MsgTxnError>;

/// Block-level reject identifiers reported on block submission.
///
/// The strings are part of the external interface and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    /// The same message transaction id appears twice in one block
    DuplicateInBlock,
    /// Anchor height is above the parent of the including block
    BadPrevBlock,
    /// Anchor hash does not match the parent, or anchor height is too low
    BadPrevBlockHash,
    /// Proof of work does not meet the cost-scaled target
    HashAboveTarget,
    /// Id was confirmed within the recent window
    AmongRecent,
    /// Id was confirmed earlier on the active chain
    TooOld,
    /// Block does not extend the current tip
    BadPrevBlk,
    /// Header tx root does not commit to the transactions
    BadTxRoot,
}

impl RejectReason {
    /// Wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DuplicateInBlock => "duplicate-msg-txns-in-block",
            Self::BadPrevBlock => "msg-txn-with-bad-prev-block",
            Self::BadPrevBlockHash => "msg-txn-bad-prev-block-hash",
            Self::HashAboveTarget => "msg-txn-hash-above-target",
            Self::AmongRecent => "msg-txn-among-recent",
            Self::TooOld => "msg-txn-too-old",
            Self::BadPrevBlk => "bad-prevblk",
            Self::BadTxRoot => "bad-txnmrklroot",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in the message transaction subsystem
#[derive(Debug, Error)]
pub enum MsgTxnError {
    /// Ciphertext is not exactly the fixed payload size
    #[error("Invalid ciphertext length: expected {expected}, got {actual}")]
    InvalidCiphertextLength {
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Bytes are not a message payload
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Work target requested for zero cost
    #[error("Invalid cost: cost must be positive")]
    InvalidCost,

    /// Mining stopped by the caller
    #[error("Mining cancelled")]
    MiningCancelled,

    /// Every nonce was tried without meeting the target
    #[error("Nonce space exhausted without meeting target")]
    NonceSpaceExhausted,

    /// Transaction has no recognizable message payload
    #[error("Not a message transaction")]
    NotMessageTransaction,

    /// Consensus rule violation
    #[error("Block rejected: {reason}")]
    Rejected {
        /// Reject identifier
        reason: RejectReason,
        /// Offending transaction, if the rule is per transaction
        txid: Option<Hash>,
    },

    /// Relay pool is at capacity
    #[error("Message pool full: capacity {0}")]
    PoolFull(usize),

    /// Configuration values are unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Reorganization could not be completed or rolled back
    #[error("Reorganization failed: {0}")]
    ReorgFailed(String),

    /// Chain store failure
    #[error(transparent)]
    ChainStore(#[from] ChainStoreError),
}

impl MsgTxnError {
    /// Shorthand for a per-transaction consensus rejection.
    pub fn rejected(reason: RejectReason, txid: Hash) -> Self {
        Self::Rejected {
            reason,
            txid: Some(txid),
        }
    }

    /// Reject identifier if this is a consensus rejection.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Self::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    /// True for deterministic rule violations, false for infrastructure errors.
    pub fn is_consensus(&self) -> bool {
        self.reject_reason().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_strings_are_exact() {
        assert_eq!(
            RejectReason::DuplicateInBlock.as_str(),
            "duplicate-msg-txns-in-block"
        );
        assert_eq!(
            RejectReason::BadPrevBlock.as_str(),
            "msg-txn-with-bad-prev-block"
        );
        assert_eq!(
            RejectReason::BadPrevBlockHash.as_str(),
            "msg-txn-bad-prev-block-hash"
        );
        assert_eq!(
            RejectReason::HashAboveTarget.as_str(),
            "msg-txn-hash-above-target"
        );
        assert_eq!(RejectReason::AmongRecent.as_str(), "msg-txn-among-recent");
        assert_eq!(RejectReason::TooOld.as_str(), "msg-txn-too-old");
    }

    #[test]
    fn test_consensus_classification() {
        let rejected = MsgTxnError::rejected(RejectReason::TooOld, [7u8; 32]);
        assert!(rejected.is_consensus());
        assert_eq!(rejected.reject_reason(), Some(RejectReason::TooOld));
        assert!(rejected.to_string().contains("msg-txn-too-old"));

        let infra = MsgTxnError::ChainStore(ChainStoreError::Backend("disk".into()));
        assert!(!infra.is_consensus());
    }
}
