//! Error types for the messenger

use qc_18_message_transactions::{ChainStoreError, MsgTxnError};
use shared_crypto::CryptoError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for messenger operations
pub type Result<T> = std::result::Result<T, MessengerError>;

/// Messenger errors
#[derive(Error, Debug)]
pub enum MessengerError {
    /// Key or cipher failure
    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// Message transaction subsystem failure
    #[error("Message transaction error: {0}")]
    MsgTxn(#[from] MsgTxnError),

    /// Chain store failure
    #[error("Chain store error: {0}")]
    ChainStore(#[from] ChainStoreError),

    /// Key store file could not be read or written
    #[error("Key store I/O error at {}: {source}", .path.display())]
    KeyStoreIo {
        /// Offending file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Key store file exists but cannot be parsed
    #[error("Key store {} is corrupt: {reason}", .path.display())]
    KeyStoreCorrupt {
        /// Offending file
        path: PathBuf,
        /// Parse failure
        reason: String,
    },

    /// Key file is encrypted and no passphrase was given
    #[error("Passphrase required to unlock {}", .0.display())]
    PassphraseRequired(PathBuf),

    /// Passphrase does not unlock the key file
    #[error("Wrong passphrase for {}", .0.display())]
    WrongPassphrase(PathBuf),

    /// Key store already has a passphrase
    #[error("Key store is already encrypted")]
    AlreadyEncrypted,

    /// Key store has no passphrase to change
    #[error("Key store is not encrypted")]
    NotEncrypted,

    /// Subject and body do not fit the fixed plaintext capacity
    #[error("Message too large: {size} bytes exceeds {max}")]
    MessageTooLarge {
        /// Encoded subject + body length
        size: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Decrypted plaintext is not a valid envelope
    #[error("Invalid message envelope: {0}")]
    InvalidEnvelope(String),

    /// No readable message with this id
    #[error("Unknown message: {0}")]
    UnknownMessage(String),

    /// Block hash not on the active chain
    #[error("Unknown block: {0}")]
    UnknownBlock(String),

    /// Raw transaction could not be decoded
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Locally assembled block was refused
    #[error("Block rejected: {0}")]
    BlockRejected(&'static str),

    /// The tip kept moving while a message was mined
    #[error("Chain tip moved {0} times while mining")]
    TipUnstable(usize),

    /// Tip height does not fit the payload's anchor field
    #[error("Anchor height {0} exceeds u32 range")]
    AnchorOutOfRange(u64),
}

impl MessengerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::KeyStoreIo {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::KeyStoreCorrupt {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
