//! Signed message envelope
//!
//! The envelope is the plaintext inside a sealed box. Layout (little-endian):
//!
//! ```text
//! sender pubkey (33) | signature (64) | subject len (u16) | body len (u16)
//! | subject | body | zero padding up to PLAINTEXT_CAPACITY
//! ```
//!
//! The sender signs `recipient || subject len || subject || body`, so an
//! envelope lifted out of one box cannot be re-sealed to someone else.

use crate::error::{MessengerError, Result};
use qc_18_message_transactions::MESSAGE_CIPHERTEXT_LEN;
use shared_crypto::{
    Secp256k1KeyPair, Secp256k1PublicKey, Secp256k1Signature, PUBLIC_KEY_LEN, SEAL_OVERHEAD,
};

/// Plaintext bytes available inside one payload ciphertext
pub const PLAINTEXT_CAPACITY: usize = MESSAGE_CIPHERTEXT_LEN - SEAL_OVERHEAD;

const SIGNATURE_LEN: usize = 64;
const HEADER_LEN: usize = PUBLIC_KEY_LEN + SIGNATURE_LEN + 2 + 2;

/// Maximum combined subject + body length in bytes
pub const MAX_CONTENT_LEN: usize = PLAINTEXT_CAPACITY - HEADER_LEN;

/// A signed subject/body pair addressed to one recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEnvelope {
    /// Sender public key
    pub from: Secp256k1PublicKey,
    /// Subject line
    pub subject: String,
    /// Message body
    pub body: String,
    signature: Secp256k1Signature,
}

fn signing_preimage(recipient: &Secp256k1PublicKey, subject: &str, body: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(PUBLIC_KEY_LEN + 2 + subject.len() + body.len());
    buf.extend_from_slice(recipient.as_bytes());
    buf.extend_from_slice(&(subject.len() as u16).to_le_bytes());
    buf.extend_from_slice(subject.as_bytes());
    buf.extend_from_slice(body.as_bytes());
    buf
}

impl MessageEnvelope {
    /// Sign a message from `sender` to `recipient`.
    pub fn sign(
        sender: &Secp256k1KeyPair,
        recipient: &Secp256k1PublicKey,
        subject: &str,
        body: &str,
    ) -> Result<Self> {
        let size = subject.len() + body.len();
        if size > MAX_CONTENT_LEN {
            return Err(MessengerError::MessageTooLarge {
                size,
                max: MAX_CONTENT_LEN,
            });
        }
        let signature = sender.sign(&signing_preimage(recipient, subject, body));
        Ok(Self {
            from: sender.public_key(),
            subject: subject.to_owned(),
            body: body.to_owned(),
            signature,
        })
    }

    /// Check the sender's signature for `recipient`.
    pub fn verify(&self, recipient: &Secp256k1PublicKey) -> Result<()> {
        self.from.verify(
            &signing_preimage(recipient, &self.subject, &self.body),
            &self.signature,
        )?;
        Ok(())
    }

    /// Fixed-size plaintext encoding.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PLAINTEXT_CAPACITY);
        buf.extend_from_slice(self.from.as_bytes());
        buf.extend_from_slice(self.signature.as_bytes());
        buf.extend_from_slice(&(self.subject.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(self.body.len() as u16).to_le_bytes());
        buf.extend_from_slice(self.subject.as_bytes());
        buf.extend_from_slice(self.body.as_bytes());
        buf.resize(PLAINTEXT_CAPACITY, 0);
        buf
    }

    /// Parse a plaintext produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != PLAINTEXT_CAPACITY {
            return Err(MessengerError::InvalidEnvelope(format!(
                "plaintext is {} bytes, expected {}",
                bytes.len(),
                PLAINTEXT_CAPACITY
            )));
        }
        let from = Secp256k1PublicKey::from_slice(&bytes[..PUBLIC_KEY_LEN])?;

        let mut sig = [0u8; SIGNATURE_LEN];
        sig.copy_from_slice(&bytes[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + SIGNATURE_LEN]);

        let lens = &bytes[PUBLIC_KEY_LEN + SIGNATURE_LEN..HEADER_LEN];
        let subject_len = u16::from_le_bytes([lens[0], lens[1]]) as usize;
        let body_len = u16::from_le_bytes([lens[2], lens[3]]) as usize;
        if subject_len + body_len > MAX_CONTENT_LEN {
            return Err(MessengerError::InvalidEnvelope(
                "content lengths exceed capacity".into(),
            ));
        }

        let text = |range: std::ops::Range<usize>| {
            String::from_utf8(bytes[range].to_vec())
                .map_err(|e| MessengerError::InvalidEnvelope(e.to_string()))
        };
        let subject_end = HEADER_LEN + subject_len;
        Ok(Self {
            from,
            subject: text(HEADER_LEN..subject_end)?,
            body: text(subject_end..subject_end + body_len)?,
            signature: Secp256k1Signature::from_bytes(sig),
        })
    }

    /// Encrypt to `recipient`; the result is exactly one payload ciphertext.
    pub fn seal(&self, recipient: &Secp256k1PublicKey) -> Result<Vec<u8>> {
        Ok(shared_crypto::seal(recipient, &self.encode())?)
    }

    /// Decrypt with `keypair` and verify the sender's signature.
    pub fn open(keypair: &Secp256k1KeyPair, ciphertext: &[u8]) -> Result<Self> {
        let plaintext = shared_crypto::open(keypair, ciphertext)?;
        let envelope = Self::decode(&plaintext)?;
        envelope.verify(&keypair.public_key())?;
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_matches_payload() {
        assert_eq!(PLAINTEXT_CAPACITY + SEAL_OVERHEAD, MESSAGE_CIPHERTEXT_LEN);
        assert_eq!(MAX_CONTENT_LEN, PLAINTEXT_CAPACITY - 101);
    }

    #[test]
    fn test_sealed_envelope_fills_ciphertext() {
        let alice = Secp256k1KeyPair::generate();
        let bob = Secp256k1KeyPair::generate();
        let envelope = MessageEnvelope::sign(&alice, &bob.public_key(), "hi", "there").unwrap();

        let sealed = envelope.seal(&bob.public_key()).unwrap();
        assert_eq!(sealed.len(), MESSAGE_CIPHERTEXT_LEN);

        let opened = MessageEnvelope::open(&bob, &sealed).unwrap();
        assert_eq!(opened, envelope);
        assert_eq!(opened.from, alice.public_key());
    }

    #[test]
    fn test_wrong_key_cannot_open() {
        let alice = Secp256k1KeyPair::generate();
        let bob = Secp256k1KeyPair::generate();
        let sealed = MessageEnvelope::sign(&alice, &bob.public_key(), "s", "b")
            .unwrap()
            .seal(&bob.public_key())
            .unwrap();
        assert!(MessageEnvelope::open(&alice, &sealed).is_err());
    }

    #[test]
    fn test_resealed_to_other_recipient_fails_signature() {
        let alice = Secp256k1KeyPair::generate();
        let bob = Secp256k1KeyPair::generate();
        let carol = Secp256k1KeyPair::generate();
        let envelope = MessageEnvelope::sign(&alice, &bob.public_key(), "s", "b").unwrap();

        let forwarded = envelope.seal(&carol.public_key()).unwrap();
        assert!(matches!(
            MessageEnvelope::open(&carol, &forwarded),
            Err(MessengerError::Crypto(_))
        ));
    }

    #[test]
    fn test_oversize_rejected() {
        let alice = Secp256k1KeyPair::generate();
        let body = "x".repeat(MAX_CONTENT_LEN);
        assert!(MessageEnvelope::sign(&alice, &alice.public_key(), "", &body).is_ok());
        assert!(matches!(
            MessageEnvelope::sign(&alice, &alice.public_key(), "!", &body),
            Err(MessengerError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_bad_utf8() {
        let alice = Secp256k1KeyPair::generate();
        let mut bytes = MessageEnvelope::sign(&alice, &alice.public_key(), "ab", "")
            .unwrap()
            .encode();
        bytes[HEADER_LEN] = 0xFF;
        assert!(matches!(
            MessageEnvelope::decode(&bytes),
            Err(MessengerError::InvalidEnvelope(_))
        ));
    }
}
