//! Shared helpers for block-level integration tests.

#![allow(dead_code)]

use qc_18_message_transactions::{
    anchor_hash32, CancelToken, ChainReader, InMemoryChainStore, MessageChainService,
    MessagePayload, MessageTransaction, MessageTxnConfig, PowMiner, MESSAGE_CIPHERTEXT_LEN,
};
use shared_types::{Block, Transaction};
use std::sync::Arc;

pub fn regtest_service() -> (Arc<InMemoryChainStore>, MessageChainService) {
    let store = Arc::new(InMemoryChainStore::with_genesis());
    let service = MessageChainService::new(store.clone(), MessageTxnConfig::regtest()).unwrap();
    (store, service)
}

fn random_ciphertext() -> Vec<u8> {
    let mut ciphertext = vec![0u8; MESSAGE_CIPHERTEXT_LEN];
    rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut ciphertext);
    ciphertext
}

/// Payload anchored at `anchor_height` with the low 32 bits `hash32`.
pub fn payload(anchor_height: u64, hash32: u32) -> MessagePayload {
    MessagePayload::new(anchor_height as u32, hash32, 0, random_ciphertext()).unwrap()
}

/// Mine a message transaction with an arbitrary anchor.
pub fn mine_with_anchor(service: &MessageChainService, anchor_height: u64, hash32: u32) -> Transaction {
    let template = payload(anchor_height, hash32);
    let target = service
        .calculator()
        .target_for(&MessageTransaction::template(&template))
        .unwrap();
    PowMiner::new(2)
        .mine(&template, target, &CancelToken::new())
        .unwrap()
        .into_transaction()
}

/// Mine a message transaction anchored at the current tip.
pub fn mine_at_tip(service: &MessageChainService) -> Transaction {
    let (height, hash) = service.store().tip().unwrap();
    mine_with_anchor(service, height, anchor_hash32(&hash))
}

/// A tip-anchored message transaction whose pow hash misses the target.
pub fn unmined_at_tip(service: &MessageChainService) -> Transaction {
    let (height, hash) = service.store().tip().unwrap();
    let template = payload(height, anchor_hash32(&hash));
    let target = service
        .calculator()
        .target_for(&MessageTransaction::template(&template))
        .unwrap();
    (0u32..)
        .map(|nonce| MessageTransaction::template(&template.with_nonce(nonce)))
        .find(|tx| qc_18_message_transactions::pow_hash(&tx.hash()) > target)
        .unwrap()
}

/// Block on top of the tip of `chain` with a coinbase plus `txs`.
pub fn next_block<C: ChainReader + ?Sized>(chain: &C, txs: Vec<Transaction>) -> Block {
    let (height, hash) = chain.tip().unwrap();
    let mut all = vec![Transaction::coinbase(height + 1, 5_000_000_000, vec![0x02; 33])];
    all.extend(txs);
    Block::new(hash, height + 1, 1_700_000_000 + height + 1, all)
}

/// Connect `n` blocks with only a coinbase.
pub fn generate(service: &MessageChainService, n: usize) {
    for _ in 0..n {
        let block = next_block(service.store().as_ref(), vec![]);
        service.connect_block(block).unwrap();
    }
}
