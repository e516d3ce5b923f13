//! Adapters: key persistence and the chain-following inbox.

pub mod inbox;
pub mod keystore;

pub use inbox::{scan_block, Inbox};
pub use keystore::{KeyStore, KEYSTORE_FILE};
