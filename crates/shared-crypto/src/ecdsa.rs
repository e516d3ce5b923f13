//! # secp256k1 Keys
//!
//! ECDSA signatures and ECDH key agreement on the secp256k1 curve.
//!
//! ## Security Properties
//!
//! - RFC 6979 deterministic nonces (no RNG dependency for signing)
//! - Constant-time scalar operations
//!
//! ## Use Cases
//!
//! - Message recipient identity (public key is the address)
//! - Sender signatures inside message envelopes
//! - Shared-secret derivation for sealed boxes

use crate::CryptoError;
use k256::{
    ecdh::{diffie_hellman, SharedSecret},
    ecdsa::{
        signature::{Signer, Verifier},
        Signature, SigningKey, VerifyingKey,
    },
    elliptic_curve::sec1::ToEncodedPoint,
    PublicKey,
};
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroize;

/// Length of a compressed SEC1 public key.
pub const PUBLIC_KEY_LEN: usize = 33;

/// Compressed secp256k1 public key (33 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Secp256k1PublicKey([u8; PUBLIC_KEY_LEN]);

impl Secp256k1PublicKey {
    /// Create from compressed bytes (33 bytes, starting with 0x02 or 0x03).
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LEN]) -> Result<Self, CryptoError> {
        // Validate it's a valid compressed point
        VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self(bytes))
    }

    /// Create from a slice that must hold exactly one compressed point.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let raw: [u8; PUBLIC_KEY_LEN] =
            bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
                expected: PUBLIC_KEY_LEN,
                actual: bytes.len(),
            })?;
        Self::from_bytes(raw)
    }

    /// Get raw compressed bytes.
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex of the compressed point.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Verify a signature.
    pub fn verify(
        &self,
        message: &[u8],
        signature: &Secp256k1Signature,
    ) -> Result<(), CryptoError> {
        let verifying_key =
            VerifyingKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)?;

        let sig = Signature::from_slice(&signature.0).map_err(|_| CryptoError::InvalidSignature)?;

        verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    pub(crate) fn to_point(self) -> Result<PublicKey, CryptoError> {
        PublicKey::from_sec1_bytes(&self.0).map_err(|_| CryptoError::InvalidPublicKey)
    }

    pub(crate) fn from_point(point: &PublicKey) -> Self {
        let encoded = point.to_encoded_point(true);
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        bytes.copy_from_slice(encoded.as_bytes());
        Self(bytes)
    }
}

impl fmt::Display for Secp256k1PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Secp256k1PublicKey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

/// ECDSA signature (64 bytes, r||s format).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Secp256k1Signature([u8; 64]);

impl Secp256k1Signature {
    /// Create from bytes (64 bytes).
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

/// secp256k1 keypair.
#[derive(Clone)]
pub struct Secp256k1KeyPair {
    signing_key: SigningKey,
}

impl Secp256k1KeyPair {
    /// Generate random keypair.
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::thread_rng());
        Self { signing_key }
    }

    /// Create from secret key bytes (32 bytes).
    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_bytes((&bytes).into()).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Create from a hex-encoded secret key.
    pub fn from_hex(secret: &str) -> Result<Self, CryptoError> {
        let mut bytes =
            hex::decode(secret.trim()).map_err(|e| CryptoError::InvalidHex(e.to_string()))?;
        let raw: Result<[u8; 32], _> = bytes.as_slice().try_into();
        let actual = bytes.len();
        bytes.zeroize();
        let mut raw = raw.map_err(|_| CryptoError::InvalidKeyLength {
            expected: 32,
            actual,
        })?;
        let keypair = Self::from_bytes(raw);
        raw.zeroize();
        keypair
    }

    /// Get public key (compressed, 33 bytes).
    pub fn public_key(&self) -> Secp256k1PublicKey {
        Secp256k1PublicKey::from_point(&PublicKey::from(self.signing_key.verifying_key()))
    }

    /// Sign a message (deterministic RFC 6979).
    pub fn sign(&self, message: &[u8]) -> Secp256k1Signature {
        let sig: Signature = self.signing_key.sign(message);
        let bytes: [u8; 64] = sig.to_bytes().into();
        Secp256k1Signature(bytes)
    }

    /// ECDH with a peer public key.
    pub fn shared_secret(&self, peer: &Secp256k1PublicKey) -> Result<SharedSecret, CryptoError> {
        let point = peer.to_point()?;
        Ok(diffie_hellman(
            self.signing_key.as_nonzero_scalar(),
            point.as_affine(),
        ))
    }

    /// Get secret key bytes (for serialization).
    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Hex of the secret key (for key files).
    pub fn to_hex(&self) -> String {
        let mut bytes = self.to_bytes();
        let encoded = hex::encode(bytes);
        bytes.zeroize();
        encoded
    }
}

impl fmt::Debug for Secp256k1KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secp256k1KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}
