//! Domain layer: envelopes and inbox entries.

pub mod envelope;
pub mod message;

pub use envelope::{MessageEnvelope, MAX_CONTENT_LEN, PLAINTEXT_CAPACITY};
pub use message::{MessageSummary, ReceivedMessage};
