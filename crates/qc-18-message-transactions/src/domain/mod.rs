//! Domain layer: pure message transaction logic.

pub mod message_tx;
pub mod miner;
pub mod payload;
pub mod recent_index;
pub mod target;
pub mod validator;

pub use message_tx::{message_ids, message_transactions, MessageTransaction};
pub use miner::{CancelToken, PowMiner};
pub use payload::{MessagePayload, MAGIC, MESSAGE_CIPHERTEXT_LEN, PAYLOAD_LEN};
pub use recent_index::RecentTxIndex;
pub use target::{anchor_hash32, meets_target, pow_hash, TargetCalculator};
pub use validator::MessageTxValidator;
