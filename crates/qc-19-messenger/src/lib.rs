//! # Quantum Chain - Messenger (Subsystem 19)
//!
//! **Bounded Context:** Sending and reading proof-of-work paid messages
//! **Architecture Compliance:** DDD + Hexagonal
//!
//! ## Purpose
//!
//! The wallet-facing half of message transactions. Subsystem 18 decides
//! which message transactions a block may carry; this crate produces them
//! and reads the ones addressed to us:
//!
//! - Sign a subject/body with the active key and seal it to the recipient
//! - Mine the payload against the tip, re-mining if the tip moves
//! - Queue it in the relay pool for the next block
//! - Follow the active chain and trial-decrypt every message transaction
//!
//! ## Architecture Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │  MessengerNode (wiring)                             │
//! │  - chain store + MessageChainService + MessagePool  │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Service                                            │
//! │  - Messenger: send / create / list / read / keys    │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Adapters                                           │
//! │  - KeyStore (msgkeys.json)                          │
//! │  - Inbox (ChainListener, parallel trial decryption) │
//! └─────────────────────────────────────────────────────┘
//!                         │
//! ┌─────────────────────────────────────────────────────┐
//! │  Domain                                             │
//! │  - MessageEnvelope (signed, fixed-size plaintext)   │
//! │  - ReceivedMessage                                  │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! let node = MessengerNode::open("/var/lib/msgnode", MessageTxnConfig::regtest())?;
//! let txid = node.messenger().send_message("hello", "first message", &recipient)?;
//! node.generate(1)?;
//! for msg in node.messenger().list_messages_since_block(None)? {
//!     println!("{msg}");
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod domain;
pub mod node;
pub mod service;

mod error;

pub use adapters::{Inbox, KeyStore, KEYSTORE_FILE};
pub use domain::{MessageEnvelope, MessageSummary, ReceivedMessage, MAX_CONTENT_LEN, PLAINTEXT_CAPACITY};
pub use error::{MessengerError, Result};
pub use node::MessengerNode;
pub use service::{Messenger, MAX_REMINE_ATTEMPTS};

/// Subsystem identifier
pub const SUBSYSTEM_ID: u8 = 19;
