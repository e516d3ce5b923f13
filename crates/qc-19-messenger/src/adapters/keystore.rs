//! File-backed messenger key store
//!
//! One active key receives new messages and signs outgoing ones. Keys that
//! were active before an import stay in the store so older messages remain
//! readable.
//!
//! The store and exported key files may be locked with a passphrase. Secrets
//! are then written as XChaCha20-Poly1305 ciphertext under an Argon2id key;
//! public keys stay readable.

use crate::error::{MessengerError, Result};
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use shared_crypto::{Nonce, PassphraseKey, Secp256k1KeyPair, Secp256k1PublicKey};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Key store file name inside a node data directory
pub const KEYSTORE_FILE: &str = "msgkeys.json";

const FORMAT_VERSION: u32 = 1;

/// Secret keys as hex.
#[derive(Serialize, Deserialize)]
struct Secrets {
    active: String,
    #[serde(default)]
    imported: Vec<String>,
}

/// Exactly one of `secrets` and `encrypted` is present.
#[derive(Serialize, Deserialize)]
struct KeyFile {
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secrets: Option<Secrets>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted: Option<EncryptedBlob>,
}

/// Exported key file. Exactly one of `secret_key` and `encrypted` is present.
#[derive(Serialize, Deserialize)]
struct ExportedKey {
    public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encrypted: Option<EncryptedBlob>,
}

/// Passphrase-encrypted JSON value.
#[derive(Serialize, Deserialize)]
struct EncryptedBlob {
    salt: String,
    nonce: String,
    ciphertext: String,
}

impl EncryptedBlob {
    fn seal<T: Serialize>(cipher: &PassphraseKey, value: &T, path: &Path) -> Result<Self> {
        let plaintext = serde_json::to_vec(value).map_err(|e| MessengerError::corrupt(path, e))?;
        let (ciphertext, nonce) = cipher.encrypt(&plaintext)?;
        Ok(Self {
            salt: hex::encode(cipher.salt()),
            nonce: hex::encode(nonce.as_bytes()),
            ciphertext: hex::encode(ciphertext),
        })
    }

    /// Derive the key from `passphrase` and decrypt.
    fn open<T: DeserializeOwned>(
        &self,
        passphrase: Option<&str>,
        path: &Path,
    ) -> Result<(T, PassphraseKey)> {
        let passphrase =
            passphrase.ok_or_else(|| MessengerError::PassphraseRequired(path.to_path_buf()))?;
        let cipher = PassphraseKey::derive(passphrase.as_bytes(), decode_array(&self.salt, path)?)?;
        let nonce = Nonce::from_bytes(decode_array(&self.nonce, path)?);
        let ciphertext = hex::decode(&self.ciphertext).map_err(|e| MessengerError::corrupt(path, e))?;
        let plaintext = cipher
            .decrypt(&ciphertext, &nonce)
            .map_err(|_| MessengerError::WrongPassphrase(path.to_path_buf()))?;
        let value = serde_json::from_slice(&plaintext).map_err(|e| MessengerError::corrupt(path, e))?;
        Ok((value, cipher))
    }
}

fn decode_array<const N: usize>(hex_str: &str, path: &Path) -> Result<[u8; N]> {
    let bytes = hex::decode(hex_str).map_err(|e| MessengerError::corrupt(path, e))?;
    bytes.try_into().map_err(|b: Vec<u8>| {
        MessengerError::corrupt(path, format!("expected {N} bytes, got {}", b.len()))
    })
}

#[derive(Clone)]
struct KeyState {
    active: Secp256k1KeyPair,
    imported: Vec<Secp256k1KeyPair>,
    /// Set when the file is passphrase-locked
    cipher: Option<PassphraseKey>,
}

/// Persistent set of messenger keypairs.
pub struct KeyStore {
    path: PathBuf,
    state: RwLock<KeyState>,
}

impl KeyStore {
    /// Open the unencrypted store at `path`, creating it with a fresh key if
    /// missing.
    ///
    /// An unreadable or corrupt file is an error; nothing is overwritten.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_passphrase(path, None)
    }

    /// Open the store at `path`, unlocking it with `passphrase` if it is
    /// encrypted. A store created here is encrypted when a passphrase is
    /// given.
    pub fn open_with_passphrase<P: AsRef<Path>>(path: P, passphrase: Option<&str>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            Self::load(&path, passphrase)?
        } else {
            let state = KeyState {
                active: Secp256k1KeyPair::generate(),
                imported: Vec::new(),
                cipher: passphrase
                    .map(|p| PassphraseKey::new(p.as_bytes()))
                    .transpose()?,
            };
            Self::persist(&path, &state)?;
            info!("[qc-19] Created key store at {}", path.display());
            state
        };
        info!("  Active key: {}", state.active.public_key());
        info!("  Imported keys: {}", state.imported.len());
        info!("  Encrypted: {}", state.cipher.is_some());
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn load(path: &Path, passphrase: Option<&str>) -> Result<KeyState> {
        let raw = fs::read_to_string(path).map_err(|e| MessengerError::io(path, e))?;
        let file: KeyFile =
            serde_json::from_str(&raw).map_err(|e| MessengerError::corrupt(path, e))?;
        if file.version != FORMAT_VERSION {
            return Err(MessengerError::corrupt(
                path,
                format!("unsupported version {}", file.version),
            ));
        }
        let (secrets, cipher) = match (file.secrets, file.encrypted) {
            (Some(secrets), None) => (secrets, None),
            (None, Some(blob)) => {
                let (secrets, cipher) = blob.open::<Secrets>(passphrase, path)?;
                (secrets, Some(cipher))
            }
            _ => {
                return Err(MessengerError::corrupt(
                    path,
                    "expected exactly one of secrets and encrypted",
                ))
            }
        };

        let parse = |secret: &str| {
            Secp256k1KeyPair::from_hex(secret).map_err(|e| MessengerError::corrupt(path, e))
        };
        Ok(KeyState {
            active: parse(&secrets.active)?,
            imported: secrets
                .imported
                .iter()
                .map(|s| parse(s))
                .collect::<Result<_>>()?,
            cipher,
        })
    }

    fn persist(path: &Path, state: &KeyState) -> Result<()> {
        let secrets = Secrets {
            active: state.active.to_hex(),
            imported: state.imported.iter().map(|k| k.to_hex()).collect(),
        };
        let file = match &state.cipher {
            None => KeyFile {
                version: FORMAT_VERSION,
                secrets: Some(secrets),
                encrypted: None,
            },
            Some(cipher) => KeyFile {
                version: FORMAT_VERSION,
                secrets: None,
                encrypted: Some(EncryptedBlob::seal(cipher, &secrets, path)?),
            },
        };
        let json = serde_json::to_string_pretty(&file).map_err(|e| MessengerError::corrupt(path, e))?;
        write_atomic(path, json.as_bytes())
    }

    /// Apply `change` to a copy of the state and commit it only once it is
    /// on disk. `change` returns false when there is nothing to write.
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut KeyState) -> Result<bool>,
    {
        let mut state = self.state.write();
        let mut next = state.clone();
        if change(&mut next)? {
            Self::persist(&self.path, &next)?;
            *state = next;
        }
        Ok(())
    }

    /// File backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if the store is passphrase-locked on disk.
    pub fn is_encrypted(&self) -> bool {
        self.state.read().cipher.is_some()
    }

    /// Public key to share with senders.
    pub fn active_public_key(&self) -> Secp256k1PublicKey {
        self.state.read().active.public_key()
    }

    /// Active keypair.
    pub fn active_key(&self) -> Secp256k1KeyPair {
        self.state.read().active.clone()
    }

    /// Every keypair, active first.
    pub fn all_keys(&self) -> Vec<Secp256k1KeyPair> {
        let state = self.state.read();
        std::iter::once(state.active.clone())
            .chain(state.imported.iter().cloned())
            .collect()
    }

    /// Lock an unencrypted store with `passphrase`.
    pub fn encrypt(&self, passphrase: &str) -> Result<()> {
        self.update(|state| {
            if state.cipher.is_some() {
                return Err(MessengerError::AlreadyEncrypted);
            }
            state.cipher = Some(PassphraseKey::new(passphrase.as_bytes())?);
            Ok(true)
        })?;
        info!("[qc-19] Encrypted key store {}", self.path.display());
        Ok(())
    }

    /// Replace the passphrase of an encrypted store.
    pub fn change_passphrase(&self, old: &str, new: &str) -> Result<()> {
        self.update(|state| {
            let cipher = state.cipher.as_ref().ok_or(MessengerError::NotEncrypted)?;
            if !cipher.matches(old.as_bytes())? {
                return Err(MessengerError::WrongPassphrase(self.path.clone()));
            }
            state.cipher = Some(PassphraseKey::new(new.as_bytes())?);
            Ok(true)
        })?;
        info!("[qc-19] Changed passphrase of {}", self.path.display());
        Ok(())
    }

    /// Write the active keypair to `dest`, encrypting the secret when a
    /// passphrase is given.
    pub fn export_key<P: AsRef<Path>>(
        &self,
        dest: P,
        passphrase: Option<&str>,
    ) -> Result<Secp256k1PublicKey> {
        let dest = dest.as_ref();
        let active = self.active_key();
        let public = active.public_key();
        let exported = match passphrase {
            None => ExportedKey {
                public_key: public.to_hex(),
                secret_key: Some(active.to_hex()),
                encrypted: None,
            },
            Some(passphrase) => {
                let cipher = PassphraseKey::new(passphrase.as_bytes())?;
                ExportedKey {
                    public_key: public.to_hex(),
                    secret_key: None,
                    encrypted: Some(EncryptedBlob::seal(&cipher, &active.to_hex(), dest)?),
                }
            }
        };
        let json = serde_json::to_string_pretty(&exported)
            .map_err(|e| MessengerError::corrupt(dest, e))?;
        write_atomic(dest, json.as_bytes())?;
        info!("[qc-19] Exported key {} to {}", public, dest.display());
        Ok(public)
    }

    /// Read a key exported by [`export_key`](Self::export_key) and make it
    /// the active key. The previous active key is kept.
    pub fn import_key<P: AsRef<Path>>(
        &self,
        src: P,
        passphrase: Option<&str>,
    ) -> Result<Secp256k1PublicKey> {
        let src = src.as_ref();
        let raw = fs::read_to_string(src).map_err(|e| MessengerError::io(src, e))?;
        let exported: ExportedKey =
            serde_json::from_str(&raw).map_err(|e| MessengerError::corrupt(src, e))?;
        let secret = match (exported.secret_key, exported.encrypted) {
            (Some(secret), None) => secret,
            (None, Some(blob)) => blob.open::<String>(passphrase, src)?.0,
            _ => {
                return Err(MessengerError::corrupt(
                    src,
                    "expected exactly one of secret_key and encrypted",
                ))
            }
        };
        let keypair =
            Secp256k1KeyPair::from_hex(&secret).map_err(|e| MessengerError::corrupt(src, e))?;
        let public = keypair.public_key();
        if public.to_hex() != exported.public_key.trim().to_ascii_lowercase() {
            return Err(MessengerError::corrupt(src, "public key does not match secret"));
        }

        self.update(|state| {
            if state.active.public_key() == public {
                return Ok(false);
            }
            state.imported.retain(|k| k.public_key() != public);
            let previous = std::mem::replace(&mut state.active, keypair);
            state.imported.push(previous);
            Ok(true)
        })?;
        info!("[qc-19] Imported key {} from {}", public, src.display());
        Ok(public)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(|e| MessengerError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| MessengerError::io(path, e))
}
