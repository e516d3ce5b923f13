//! # Passphrase Keys
//!
//! Argon2id derivation of an XChaCha20-Poly1305 key from a passphrase and a
//! random salt. The salt is stored next to the ciphertext; the passphrase
//! never is.

use crate::symmetric::{self, Nonce, SecretKey};
use crate::CryptoError;
use argon2::Argon2;

/// Salt length in bytes.
pub const SALT_LEN: usize = 16;

/// Symmetric key bound to the salt it was derived with.
#[derive(Clone)]
pub struct PassphraseKey {
    salt: [u8; SALT_LEN],
    key: SecretKey,
}

impl PassphraseKey {
    /// Derive a key for `passphrase` under a fresh random salt.
    pub fn new(passphrase: &[u8]) -> Result<Self, CryptoError> {
        let mut salt = [0u8; SALT_LEN];
        rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut salt);
        Self::derive(passphrase, salt)
    }

    /// Re-derive the key for `passphrase` under a stored `salt`.
    pub fn derive(passphrase: &[u8], salt: [u8; SALT_LEN]) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; 32];
        Argon2::default()
            .hash_password_into(passphrase, &salt, &mut bytes)
            .map_err(|e| CryptoError::KeyDerivationFailed(e.to_string()))?;
        Ok(Self {
            salt,
            key: SecretKey::from_bytes(bytes),
        })
    }

    /// Salt to store with anything encrypted under this key.
    pub fn salt(&self) -> &[u8; SALT_LEN] {
        &self.salt
    }

    /// True if `passphrase` derives this same key.
    pub fn matches(&self, passphrase: &[u8]) -> Result<bool, CryptoError> {
        let other = Self::derive(passphrase, self.salt)?;
        Ok(other.key.as_bytes() == self.key.as_bytes())
    }

    /// Encrypt under this key.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<(Vec<u8>, Nonce), CryptoError> {
        symmetric::encrypt(&self.key, plaintext)
    }

    /// Decrypt; a wrong passphrase surfaces as `DecryptionFailed`.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &Nonce) -> Result<Vec<u8>, CryptoError> {
        symmetric::decrypt(&self.key, ciphertext, nonce)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_passphrase_and_salt_derive_same_key() {
        let key = PassphraseKey::new(b"correct horse").unwrap();
        let again = PassphraseKey::derive(b"correct horse", *key.salt()).unwrap();

        let (ciphertext, nonce) = key.encrypt(b"secret").unwrap();
        assert_eq!(again.decrypt(&ciphertext, &nonce).unwrap(), b"secret");
        assert!(key.matches(b"correct horse").unwrap());
    }

    #[test]
    fn test_wrong_passphrase_fails_to_decrypt() {
        let key = PassphraseKey::new(b"correct horse").unwrap();
        let wrong = PassphraseKey::derive(b"battery staple", *key.salt()).unwrap();

        let (ciphertext, nonce) = key.encrypt(b"secret").unwrap();
        assert!(matches!(
            wrong.decrypt(&ciphertext, &nonce),
            Err(CryptoError::DecryptionFailed(_))
        ));
        assert!(!key.matches(b"battery staple").unwrap());
    }

    #[test]
    fn test_fresh_salts_differ() {
        let a = PassphraseKey::new(b"same").unwrap();
        let b = PassphraseKey::new(b"same").unwrap();
        assert_ne!(a.salt(), b.salt());
    }
}
