//! Messenger Service
//!
//! Composes, encrypts and mines outgoing messages and answers inbox
//! queries. Mining anchors at the current tip; a chain change while a
//! search is running cancels it and the message is mined again on the new
//! tip.

use crate::adapters::{Inbox, KeyStore};
use crate::domain::{MessageEnvelope, ReceivedMessage};
use crate::error::{MessengerError, Result};
use parking_lot::Mutex;
use qc_18_message_transactions::{
    anchor_hash32, CancelToken, ChainListener, MessageChainApi, MessageChainService, MessagePayload,
    MessagePool, MessageTransaction, MsgTxnError, PowMiner,
};
use shared_crypto::Secp256k1PublicKey;
use shared_types::{Block, Hash, Transaction};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Attempts before giving up on a tip that keeps moving
pub const MAX_REMINE_ATTEMPTS: usize = 16;

/// Cancels in-flight searches whenever the active chain changes.
#[derive(Default)]
struct MiningInterrupter {
    next_id: Mutex<u64>,
    running: Mutex<HashMap<u64, CancelToken>>,
}

impl MiningInterrupter {
    fn register(&self) -> (u64, CancelToken) {
        let id = {
            let mut next = self.next_id.lock();
            *next += 1;
            *next
        };
        let token = CancelToken::new();
        self.running.lock().insert(id, token.clone());
        (id, token)
    }

    fn release(&self, id: u64) {
        self.running.lock().remove(&id);
    }

    fn interrupt_all(&self) {
        for token in self.running.lock().values() {
            token.cancel();
        }
    }
}

impl ChainListener for MiningInterrupter {
    fn block_connected(&self, _block: &Block) {
        self.interrupt_all();
    }

    fn block_disconnected(&self, _block: &Block) {
        self.interrupt_all();
    }
}

/// Wallet-side messenger operations for one node.
pub struct Messenger {
    service: Arc<MessageChainService>,
    pool: Arc<MessagePool>,
    keys: Arc<KeyStore>,
    inbox: Arc<Inbox>,
    interrupter: Arc<MiningInterrupter>,
    default_threads: usize,
}

impl Messenger {
    /// Wire a messenger to `service`. The inbox and the mining interrupter
    /// are subscribed to chain notifications here.
    pub fn new(
        service: Arc<MessageChainService>,
        pool: Arc<MessagePool>,
        keys: Arc<KeyStore>,
        inbox: Arc<Inbox>,
    ) -> Self {
        let interrupter = Arc::new(MiningInterrupter::default());
        service.subscribe(inbox.clone());
        service.subscribe(interrupter.clone());
        let default_threads = service.config().effective_mining_threads();
        info!("[qc-19] Messenger ready, {} mining threads", default_threads);
        Self {
            service,
            pool,
            keys,
            inbox,
            interrupter,
            default_threads,
        }
    }

    /// Public key senders should encrypt to.
    pub fn get_active_key(&self) -> Secp256k1PublicKey {
        self.keys.active_public_key()
    }

    /// Write the active key to `path`, encrypted when `passphrase` is set.
    pub fn export_key<P: AsRef<Path>>(
        &self,
        path: P,
        passphrase: Option<&str>,
    ) -> Result<Secp256k1PublicKey> {
        self.keys.export_key(path, passphrase)
    }

    /// Import a key and make it active, optionally rescanning the chain for
    /// messages it can read. The rescan holds off block processing so no
    /// connect slips between the chain read and the inbox swap.
    pub fn import_key<P: AsRef<Path>>(
        &self,
        path: P,
        passphrase: Option<&str>,
        rescan: bool,
    ) -> Result<Secp256k1PublicKey> {
        let key = self.keys.import_key(path, passphrase)?;
        if rescan {
            self.service.with_chain_locked(|store| self.inbox.rescan(store))?;
        }
        Ok(key)
    }

    /// Encrypt, mine with the default worker count, and queue for the next
    /// block. Returns the transaction id.
    pub fn send_message(
        &self,
        subject: &str,
        body: &str,
        recipient: &Secp256k1PublicKey,
    ) -> Result<Hash> {
        let msg = self.mine_message(subject, body, recipient, self.default_threads)?;
        self.relay_transaction(msg.transaction())
    }

    /// Encrypt and mine with `workers` threads, returning the raw
    /// transaction as hex without relaying it.
    pub fn create_message_transaction(
        &self,
        subject: &str,
        body: &str,
        recipient: &Secp256k1PublicKey,
        workers: usize,
    ) -> Result<String> {
        let msg = self.mine_message(subject, body, recipient, workers)?;
        Ok(msg.transaction().to_hex())
    }

    /// Admit a message transaction into the relay pool.
    pub fn relay_transaction(&self, tx: &Transaction) -> Result<Hash> {
        let msg = self.service.check_for_relay(tx)?;
        let id = msg.id();
        if self.pool.insert(msg)? {
            debug!("[qc-19] Queued message transaction {}", hex::encode(id));
        }
        Ok(id)
    }

    /// [`relay_transaction`](Self::relay_transaction) for a hex-encoded
    /// transaction.
    pub fn relay_raw_transaction(&self, raw: &str) -> Result<Hash> {
        let tx = Transaction::from_hex(raw)
            .map_err(|e| MessengerError::InvalidTransaction(e.to_string()))?;
        self.relay_transaction(&tx)
    }

    /// Messages confirmed after the block `since` (all when `None`), in
    /// commitment order.
    pub fn list_messages_since_block(&self, since: Option<&Hash>) -> Result<Vec<ReceivedMessage>> {
        let after = match since {
            Some(hash) => Some(self.active_height_of(hash)?),
            None => None,
        };
        Ok(self.inbox.list_since(after))
    }

    /// Decrypted message carried by `txid`.
    pub fn read_message(&self, txid: &Hash) -> Result<ReceivedMessage> {
        self.inbox
            .get(txid)
            .ok_or_else(|| MessengerError::UnknownMessage(hex::encode(txid)))
    }

    /// Inbox backing the read operations.
    pub fn inbox(&self) -> &Arc<Inbox> {
        &self.inbox
    }

    /// Local keys.
    pub fn keys(&self) -> &Arc<KeyStore> {
        &self.keys
    }

    fn active_height_of(&self, hash: &Hash) -> Result<u64> {
        let store = self.service.store();
        let (tip, _) = store.tip()?;
        for height in (0..=tip).rev() {
            if store.block_hash_at(height)?.as_ref() == Some(hash) {
                return Ok(height);
            }
        }
        Err(MessengerError::UnknownBlock(hex::encode(hash)))
    }

    #[tracing::instrument(skip_all, fields(workers = workers))]
    fn mine_message(
        &self,
        subject: &str,
        body: &str,
        recipient: &Secp256k1PublicKey,
        workers: usize,
    ) -> Result<MessageTransaction> {
        let sender = self.keys.active_key();
        let ciphertext = MessageEnvelope::sign(&sender, recipient, subject, body)?.seal(recipient)?;
        let miner = PowMiner::new(workers);

        for attempt in 1..=MAX_REMINE_ATTEMPTS {
            let (height, hash) = self.service.tip()?;
            let anchor = u32::try_from(height).map_err(|_| MessengerError::AnchorOutOfRange(height))?;
            let template = MessagePayload::new(anchor, anchor_hash32(&hash), 0, ciphertext.clone())?;
            let target = self
                .service
                .calculator()
                .target_for(&MessageTransaction::template(&template))?;

            let (id, cancel) = self.interrupter.register();
            let result = miner.mine(&template, target, &cancel);
            self.interrupter.release(id);

            match result {
                Ok(msg) if self.service.tip()? == (height, hash) => return Ok(msg),
                Ok(_) | Err(MsgTxnError::MiningCancelled) => {
                    debug!(
                        "[qc-19] Tip moved from {} during mining (attempt {}), re-mining",
                        height, attempt
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(MessengerError::TipUnstable(MAX_REMINE_ATTEMPTS))
    }
}
