//! # Shared Crypto - Key and Cipher Primitives
//!
//! ## Components
//!
//! | Module | Algorithm | Use Case |
//! |--------|-----------|----------|
//! | `ecdsa` | secp256k1 | Recipient identity, sender signatures, ECDH |
//! | `symmetric` | XChaCha20-Poly1305 | Authenticated encryption |
//! | `sealed` | ECDH + XChaCha20-Poly1305 | Fixed-overhead message boxes |
//! | `passphrase` | Argon2id + XChaCha20-Poly1305 | Key files at rest |
//!
//! ## Security Properties
//!
//! - **XChaCha20**: 192-bit nonce, constant-time, side-channel immune
//! - **secp256k1**: RFC 6979 deterministic signatures
//! - **Sealed boxes**: fresh ephemeral key per box, no sender linkage

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ecdsa;
pub mod errors;
pub mod passphrase;
pub mod sealed;
pub mod symmetric;

// Re-exports
pub use ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature, PUBLIC_KEY_LEN};
pub use errors::CryptoError;
pub use passphrase::{PassphraseKey, SALT_LEN};
pub use sealed::{open, seal, SEAL_OVERHEAD};
pub use symmetric::{decrypt, encrypt, Nonce, SecretKey};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }

    #[test]
    fn test_overhead_constant() {
        assert_eq!(super::SEAL_OVERHEAD, 33 + 24 + 16);
    }
}
