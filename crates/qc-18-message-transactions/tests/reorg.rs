//! Index and replay behaviour across disconnects and reorganizations.

mod common;

use common::*;
use qc_18_message_transactions::{
    ChainReader, ChainStore, InMemoryChainStore, MessageChainApi, MessageChainService,
    MessageTxnConfig, MSG_TXN_ACCEPTED_DEPTH,
};
use shared_types::Block;
use std::sync::Arc;

/// Copy of the active chain up to `height`, for building a competing branch.
fn fork_store(service: &MessageChainService, height: u64) -> InMemoryChainStore {
    let blocks = (0..=height).map(|h| service.store().block_at(h).unwrap().unwrap());
    InMemoryChainStore::from_blocks(blocks).unwrap()
}

/// Extend `scratch` by one block and return it.
fn extend(scratch: &InMemoryChainStore, txs: Vec<shared_types::Transaction>) -> Block {
    let block = next_block(scratch, txs);
    scratch.append(block.clone()).unwrap();
    block
}

#[test]
fn test_disconnect_makes_message_eligible_again() {
    let (_store, service) = regtest_service();
    generate(&service, 2);

    let tx = mine_at_tip(&service);
    let block = next_block(service.store().as_ref(), vec![tx.clone()]);
    service.connect_block(block).unwrap();
    assert!(service.is_recent(&tx.hash()));

    service.disconnect_tip().unwrap();
    assert!(!service.is_recent(&tx.hash()));
    assert!(service.store().find_transaction(&tx.hash()).unwrap().is_none());

    // Same parent, so the original anchor is valid again.
    let again = next_block(service.store().as_ref(), vec![tx.clone()]);
    assert_eq!(service.submit_block(again).unwrap(), None);
    assert!(service.is_recent(&tx.hash()));
}

#[test]
fn test_disconnect_backfills_window_floor() {
    let (_store, service) = regtest_service();
    let tx = mine_at_tip(&service);
    service
        .connect_block(next_block(service.store().as_ref(), vec![tx.clone()]))
        .unwrap();

    generate(&service, MSG_TXN_ACCEPTED_DEPTH as usize);
    assert!(!service.is_recent(&tx.hash()));

    service.disconnect_tip().unwrap();
    assert!(service.is_recent(&tx.hash()), "height 1 re-enters the window");
    assert_eq!(
        service.submit_block(next_block(service.store().as_ref(), vec![tx])).unwrap(),
        Some("msg-txn-among-recent")
    );
}

#[test]
fn test_reorganize_follows_active_chain() {
    let (_store, service) = regtest_service();
    generate(&service, 2);

    let old_msg = mine_at_tip(&service);
    service
        .connect_block(next_block(service.store().as_ref(), vec![old_msg.clone()]))
        .unwrap();
    generate(&service, 2);

    let scratch = fork_store(&service, 2);
    let mut branch = vec![extend(&scratch, vec![])];
    let (h, hash) = scratch.tip().unwrap();
    let new_msg = mine_with_anchor(&service, h, qc_18_message_transactions::anchor_hash32(&hash));
    branch.push(extend(&scratch, vec![new_msg.clone()]));
    branch.push(extend(&scratch, vec![]));
    branch.push(extend(&scratch, vec![]));
    let branch_tip = scratch.tip().unwrap();

    service.reorganize(2, branch).unwrap();

    assert_eq!(service.store().tip().unwrap(), branch_tip);
    assert!(!service.is_recent(&old_msg.hash()));
    assert!(service.store().find_transaction(&old_msg.hash()).unwrap().is_none());
    assert!(service.is_recent(&new_msg.hash()));
    assert_eq!(service.metrics().reorgs.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[test]
fn test_failed_reorganize_restores_old_branch() {
    let (_store, service) = regtest_service();
    generate(&service, 2);

    let old_msg = mine_at_tip(&service);
    service
        .connect_block(next_block(service.store().as_ref(), vec![old_msg.clone()]))
        .unwrap();
    let old_tip = service.store().tip().unwrap();

    let scratch = fork_store(&service, 2);
    let good = extend(&scratch, vec![]);
    let (h, hash) = scratch.tip().unwrap();
    let dup = mine_with_anchor(&service, h, qc_18_message_transactions::anchor_hash32(&hash));
    let bad = next_block(&scratch, vec![dup.clone(), dup]);

    let err = service.reorganize(2, vec![good, bad]).unwrap_err();
    assert_eq!(
        err.reject_reason().map(|r| r.as_str()),
        Some("duplicate-msg-txns-in-block")
    );
    assert_eq!(service.store().tip().unwrap(), old_tip);
    assert!(service.is_recent(&old_msg.hash()));
}

#[test]
fn test_restart_after_reorg_rebuilds_same_index() {
    let store = Arc::new(InMemoryChainStore::with_genesis());
    let service = MessageChainService::new(store.clone(), MessageTxnConfig::regtest()).unwrap();
    generate(&service, 1);
    let msg = mine_at_tip(&service);
    service
        .connect_block(next_block(service.store().as_ref(), vec![msg.clone()]))
        .unwrap();
    service.disconnect_tip().unwrap();
    generate(&service, 3);

    let restarted = MessageChainService::new(store, MessageTxnConfig::regtest()).unwrap();
    assert_eq!(restarted.index().len(), service.index().len());
    assert!(!restarted.is_recent(&msg.hash()));
}

#[test]
fn test_chain_lock_holds_off_concurrent_connect() {
    let (_store, service) = regtest_service();
    let service = &service;
    let block = next_block(service.store().as_ref(), vec![]);

    std::thread::scope(|s| {
        let (seen, writer) = service.with_chain_locked(|store| {
            let writer = s.spawn(move || service.connect_block(block));
            std::thread::sleep(std::time::Duration::from_millis(100));
            assert!(!writer.is_finished());
            (store.tip().unwrap().0, writer)
        });
        assert_eq!(seen, 0);
        writer.join().unwrap().unwrap();
    });
    assert_eq!(service.store().tip().unwrap().0, 1);
}
