//! # Symmetric Encryption
//!
//! XChaCha20-Poly1305 with random 192-bit nonces.

use crate::CryptoError;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

/// Nonce length in bytes.
pub const NONCE_LEN: usize = 24;

/// Poly1305 tag length in bytes.
pub const TAG_LEN: usize = 16;

/// Secret key (256-bit).
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Derive a key as SHA-256 over the concatenated parts.
    pub fn derive(parts: &[&[u8]]) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part);
        }
        Self(hasher.finalize().into())
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Nonce for encryption.
#[derive(Clone)]
pub struct Nonce([u8; NONCE_LEN]);

impl Nonce {
    /// Create from bytes.
    pub fn from_bytes(bytes: [u8; NONCE_LEN]) -> Self {
        Self(bytes)
    }

    /// Generate random nonce (safe with XChaCha20's 192-bit nonce).
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
        Self(bytes)
    }

    /// Get inner bytes.
    pub fn as_bytes(&self) -> &[u8; NONCE_LEN] {
        &self.0
    }
}

/// Encrypt plaintext with XChaCha20-Poly1305.
///
/// Returns (ciphertext, nonce). The ciphertext is `TAG_LEN` bytes longer
/// than the plaintext.
///
/// # Errors
///
/// Returns `CryptoError::EncryptionFailed` if encryption fails.
pub fn encrypt(key: &SecretKey, plaintext: &[u8]) -> Result<(Vec<u8>, Nonce), CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());
    let nonce = Nonce::generate();

    let ciphertext = cipher
        .encrypt(XNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))?;

    Ok((ciphertext, nonce))
}

/// Decrypt ciphertext with XChaCha20-Poly1305.
///
/// # Errors
///
/// Returns `CryptoError::DecryptionFailed` if decryption fails.
pub fn decrypt(key: &SecretKey, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.as_bytes().into());

    cipher
        .decrypt(XNonce::from_slice(nonce.as_bytes()), ciphertext)
        .map_err(|e| CryptoError::DecryptionFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_key_fails() {
        let key1 = SecretKey::generate();
        let key2 = SecretKey::generate();

        let (ciphertext, nonce) = encrypt(&key1, b"Secret message").unwrap();
        assert!(decrypt(&key2, &ciphertext, &nonce).is_err());
        assert!(decrypt(&key1, &ciphertext, &nonce).is_ok());
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = SecretKey::generate();

        let (mut ciphertext, nonce) = encrypt(&key, b"Secret message").unwrap();
        ciphertext[0] ^= 0xFF;

        assert!(decrypt(&key, &ciphertext, &nonce).is_err());
    }

    #[test]
    fn test_ciphertext_overhead_is_tag() {
        let key = SecretKey::generate();
        let (ciphertext, _) = encrypt(&key, &[0u8; 100]).unwrap();
        assert_eq!(ciphertext.len(), 100 + TAG_LEN);
    }

    #[test]
    fn test_derive_is_deterministic() {
        let a = SecretKey::derive(&[b"shared", b"context"]);
        let b = SecretKey::derive(&[b"sharedcontext"]);
        let c = SecretKey::derive(&[b"other"]);
        assert_eq!(a.as_bytes(), b.as_bytes());
        assert_ne!(a.as_bytes(), c.as_bytes());
    }
}
