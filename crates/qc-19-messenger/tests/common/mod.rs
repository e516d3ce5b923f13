//! Shared helpers for messenger integration tests.

#![allow(dead_code)]

use qc_18_message_transactions::MessageTxnConfig;
use qc_19_messenger::MessengerNode;
use shared_types::Block;
use tempfile::TempDir;

pub fn config() -> MessageTxnConfig {
    MessageTxnConfig {
        mining_threads: 2,
        ..MessageTxnConfig::regtest()
    }
}

/// In-memory node whose key store lives in `dir`.
pub fn node(dir: &TempDir, name: &str) -> MessengerNode {
    MessengerNode::in_memory(dir.path().join(format!("{name}.json")), config()).unwrap()
}

/// Hand `blocks` to every node in `to`, as block relay would.
pub fn sync(blocks: &[Block], to: &[&MessengerNode]) {
    for node in to {
        for block in blocks {
            assert_eq!(node.submit_block(block.clone()).unwrap(), None);
        }
    }
}

pub fn subjects(node: &MessengerNode) -> Vec<String> {
    let mut subjects: Vec<_> = node
        .messenger()
        .list_messages_since_block(None)
        .unwrap()
        .into_iter()
        .map(|m| m.subject)
        .collect();
    subjects.sort();
    subjects
}
