//! # Message Payload Codec
//!
//! Fixed binary layout carried in a data-carrier output:
//!
//! ```text
//! offset  size  field
//! 0       8     magic "MSGFREE:"
//! 8       4     anchor height (u32 LE)
//! 12      4     anchor hash, low 32 bits (u32 LE)
//! 16      4     nonce (u32 LE)
//! 20      1200  ciphertext
//! ```

use crate::error::{MsgTxnError, Result};
use std::fmt;

/// Marker that opens every payload.
pub const MAGIC: &[u8; 8] = b"MSGFREE:";

/// Fixed ciphertext size. Messages are padded to this length before sealing.
pub const MESSAGE_CIPHERTEXT_LEN: usize = 1200;

/// Offset of the nonce field.
pub const NONCE_OFFSET: usize = 16;

const HEADER_LEN: usize = 20;

/// Total encoded payload length.
pub const PAYLOAD_LEN: usize = HEADER_LEN + MESSAGE_CIPHERTEXT_LEN;

/// Decoded message payload.
#[derive(Clone, PartialEq, Eq)]
pub struct MessagePayload {
    /// Height of the block the message commits to
    pub anchor_height: u32,
    /// Low 32 bits of that block's hash
    pub anchor_hash32: u32,
    /// Proof-of-work nonce
    pub nonce: u32,
    ciphertext: Vec<u8>,
}

impl MessagePayload {
    /// Build a payload, checking the ciphertext size.
    pub fn new(anchor_height: u32, anchor_hash32: u32, nonce: u32, ciphertext: Vec<u8>) -> Result<Self> {
        if ciphertext.len() != MESSAGE_CIPHERTEXT_LEN {
            return Err(MsgTxnError::InvalidCiphertextLength {
                expected: MESSAGE_CIPHERTEXT_LEN,
                actual: ciphertext.len(),
            });
        }
        Ok(Self {
            anchor_height,
            anchor_hash32,
            nonce,
            ciphertext,
        })
    }

    /// Sealed message bytes.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Same payload with a different nonce.
    pub fn with_nonce(&self, nonce: u32) -> Self {
        Self {
            nonce,
            ..self.clone()
        }
    }

    /// Encode to the fixed layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(PAYLOAD_LEN);
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.anchor_height.to_le_bytes());
        out.extend_from_slice(&self.anchor_hash32.to_le_bytes());
        out.extend_from_slice(&self.nonce.to_le_bytes());
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode the fixed layout.
    ///
    /// # Errors
    ///
    /// `MalformedPayload` if the length is wrong or the magic differs.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PAYLOAD_LEN {
            return Err(MsgTxnError::MalformedPayload(format!(
                "length {} (expected {PAYLOAD_LEN})",
                bytes.len()
            )));
        }
        if &bytes[..MAGIC.len()] != MAGIC {
            return Err(MsgTxnError::MalformedPayload("bad magic".into()));
        }
        Ok(Self {
            anchor_height: read_u32(bytes, 8),
            anchor_hash32: read_u32(bytes, 12),
            nonce: read_u32(bytes, NONCE_OFFSET),
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }
}

impl fmt::Debug for MessagePayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessagePayload")
            .field("anchor_height", &self.anchor_height)
            .field("anchor_hash32", &format_args!("{:#010x}", self.anchor_hash32))
            .field("nonce", &self.nonce)
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[offset..offset + 4]);
    u32::from_le_bytes(raw)
}

/// Encode a payload from its parts.
pub fn encode(anchor_height: u32, anchor_hash32: u32, nonce: u32, ciphertext: &[u8]) -> Result<Vec<u8>> {
    Ok(MessagePayload::new(anchor_height, anchor_hash32, nonce, ciphertext.to_vec())?.encode())
}

/// Decode payload bytes.
pub fn decode(bytes: &[u8]) -> Result<MessagePayload> {
    MessagePayload::decode(bytes)
}
