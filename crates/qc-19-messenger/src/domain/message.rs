//! Decrypted inbox entries

use serde::Serialize;
use shared_crypto::Secp256k1PublicKey;
use shared_types::Hash;
use std::fmt;

/// A message addressed to one of this node's keys, as found on chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Carrying transaction id
    pub txid: Hash,
    /// Height of the confirming block
    pub block_height: u64,
    /// Hash of the confirming block
    pub block_hash: Hash,
    /// Position of the transaction inside the block
    pub tx_index: u32,
    /// Sender key
    pub from: Secp256k1PublicKey,
    /// Local key that decrypted the message
    pub to: Secp256k1PublicKey,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}

impl ReceivedMessage {
    /// Commitment order: by block height, then position in block.
    pub fn position(&self) -> (u64, u32) {
        (self.block_height, self.tx_index)
    }

    /// JSON-friendly view with hex identifiers.
    pub fn summary(&self) -> MessageSummary {
        MessageSummary {
            txid: hex::encode(self.txid),
            block_height: self.block_height,
            block_hash: hex::encode(self.block_hash),
            from: self.from.to_hex(),
            to: self.to.to_hex(),
            subject: self.subject.clone(),
            body: self.body.clone(),
        }
    }
}

impl fmt::Display for ReceivedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @{} from {}: {}",
            hex::encode(self.txid),
            self.block_height,
            self.from,
            self.subject
        )
    }
}

/// Serializable form of [`ReceivedMessage`].
#[derive(Clone, Debug, Serialize)]
pub struct MessageSummary {
    /// Transaction id (hex)
    pub txid: String,
    /// Confirming block height
    pub block_height: u64,
    /// Confirming block hash (hex)
    pub block_hash: String,
    /// Sender key (hex)
    pub from: String,
    /// Recipient key (hex)
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
}
