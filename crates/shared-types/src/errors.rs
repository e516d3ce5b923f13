//! # Error Types
//!
//! Defines error types used across subsystems.

use thiserror::Error;

/// Errors decoding the canonical transaction encoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Input ended before a field was complete.
    #[error("Unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: usize },

    /// Bytes remained after the final field.
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),

    /// Output script tag is not recognized.
    #[error("Unknown output script tag: {0:#04x}")]
    UnknownScriptTag(u8),

    /// Raw transaction was not valid hex.
    #[error("Invalid hex: {0}")]
    InvalidHex(String),
}
