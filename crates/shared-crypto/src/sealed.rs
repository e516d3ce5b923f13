//! # Sealed Boxes
//!
//! Anonymous public-key encryption: an ephemeral secp256k1 key agrees a
//! secret with the recipient, and XChaCha20-Poly1305 encrypts under a key
//! derived from it.
//!
//! Layout: `ephemeral_pubkey (33) || nonce (24) || ciphertext+tag`.
//! The box is exactly `SEAL_OVERHEAD` bytes longer than the plaintext, so
//! fixed-size plaintexts give fixed-size boxes.

use crate::ecdsa::{Secp256k1KeyPair, Secp256k1PublicKey, PUBLIC_KEY_LEN};
use crate::symmetric::{self, Nonce, SecretKey, NONCE_LEN, TAG_LEN};
use crate::CryptoError;
use k256::ecdh::EphemeralSecret;

/// Bytes a sealed box adds to its plaintext.
pub const SEAL_OVERHEAD: usize = PUBLIC_KEY_LEN + NONCE_LEN + TAG_LEN;

fn box_key(shared: &[u8], ephemeral: &Secp256k1PublicKey, recipient: &Secp256k1PublicKey) -> SecretKey {
    SecretKey::derive(&[shared, ephemeral.as_bytes(), recipient.as_bytes()])
}

/// Encrypt `plaintext` so only the holder of `recipient`'s secret can open it.
pub fn seal(recipient: &Secp256k1PublicKey, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let ephemeral = EphemeralSecret::random(&mut rand::thread_rng());
    let ephemeral_pub = Secp256k1PublicKey::from_point(&ephemeral.public_key());
    let shared = ephemeral.diffie_hellman(&recipient.to_point()?);

    let key = box_key(shared.raw_secret_bytes(), &ephemeral_pub, recipient);
    let (ciphertext, nonce) = symmetric::encrypt(&key, plaintext)?;

    let mut out = Vec::with_capacity(SEAL_OVERHEAD + plaintext.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(nonce.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a sealed box with the recipient's keypair.
///
/// # Errors
///
/// `DecryptionFailed` when the box was sealed for another key or altered.
pub fn open(keypair: &Secp256k1KeyPair, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < SEAL_OVERHEAD {
        return Err(CryptoError::SealedBoxTooShort(sealed.len()));
    }
    let (ephemeral_raw, rest) = sealed.split_at(PUBLIC_KEY_LEN);
    let (nonce_raw, ciphertext) = rest.split_at(NONCE_LEN);

    let ephemeral_pub = Secp256k1PublicKey::from_slice(ephemeral_raw)?;
    let shared = keypair.shared_secret(&ephemeral_pub)?;
    let key = box_key(shared.raw_secret_bytes(), &ephemeral_pub, &keypair.public_key());

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(nonce_raw);
    symmetric::decrypt(&key, ciphertext, &Nonce::from_bytes(nonce))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recipient_opens() {
        let bob = Secp256k1KeyPair::generate();
        let sealed = seal(&bob.public_key(), b"meet at noon").unwrap();

        assert_eq!(sealed.len(), SEAL_OVERHEAD + 12);
        assert_eq!(open(&bob, &sealed).unwrap(), b"meet at noon");
    }

    #[test]
    fn test_other_key_cannot_open() {
        let bob = Secp256k1KeyPair::generate();
        let eve = Secp256k1KeyPair::generate();
        let sealed = seal(&bob.public_key(), b"meet at noon").unwrap();

        assert!(matches!(
            open(&eve, &sealed),
            Err(CryptoError::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_boxes_are_randomized() {
        let bob = Secp256k1KeyPair::generate();
        let a = seal(&bob.public_key(), b"same").unwrap();
        let b = seal(&bob.public_key(), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_short_box_rejected() {
        let bob = Secp256k1KeyPair::generate();
        assert!(matches!(
            open(&bob, &[0u8; 10]),
            Err(CryptoError::SealedBoxTooShort(10))
        ));
    }

    #[test]
    fn test_garbage_box_rejected() {
        let bob = Secp256k1KeyPair::generate();
        assert!(open(&bob, &[0u8; SEAL_OVERHEAD + 8]).is_err());
    }
}
