//! Moving a messenger key between nodes.

mod common;

use common::*;
use qc_19_messenger::MessengerError;

#[test]
fn test_import_with_rescan_reads_existing_messages() {
    let dir = tempfile::tempdir().unwrap();
    let a = node(&dir, "a");
    let b = node(&dir, "b");
    let c = node(&dir, "c");
    let a_key = a.messenger().get_active_key();
    let b_original = b.messenger().get_active_key();

    for subject in ["first", "second"] {
        let raw = c
            .messenger()
            .create_message_transaction(subject, "for a", &a_key, 2)
            .unwrap();
        a.messenger().relay_raw_transaction(&raw).unwrap();
    }
    let blocks = a.generate(1).unwrap();
    sync(&blocks, &[&b, &c]);
    assert!(subjects(&b).is_empty());

    let exported = dir.path().join("a-key.json");
    assert_eq!(a.messenger().export_key(&exported, None).unwrap(), a_key);

    // Without rescan only future blocks are read.
    b.messenger().import_key(&exported, None, false).unwrap();
    assert_eq!(b.messenger().get_active_key(), a_key);
    assert!(subjects(&b).is_empty());

    b.messenger().import_key(&exported, None, true).unwrap();
    assert_eq!(subjects(&b), subjects(&a));
    assert_eq!(subjects(&b), ["first", "second"]);

    // The replaced key still decrypts.
    let raw = c
        .messenger()
        .create_message_transaction("to old key", "", &b_original, 2)
        .unwrap();
    b.messenger().relay_raw_transaction(&raw).unwrap();
    let more = b.generate(1).unwrap();
    sync(&more, &[&a]);
    assert_eq!(subjects(&b).len(), 3);
    assert_eq!(subjects(&a).len(), 2);
}

#[test]
fn test_imported_key_reads_new_blocks_without_rescan() {
    let dir = tempfile::tempdir().unwrap();
    let a = node(&dir, "a");
    let b = node(&dir, "b");
    let a_key = a.messenger().get_active_key();

    let exported = dir.path().join("a-key.json");
    a.messenger().export_key(&exported, None).unwrap();
    b.messenger().import_key(&exported, None, false).unwrap();

    a.messenger().send_message("hello", "both of you", &a_key).unwrap();
    let blocks = a.generate(1).unwrap();
    sync(&blocks, &[&b]);

    assert_eq!(subjects(&a), ["hello"]);
    assert_eq!(subjects(&b), ["hello"]);
}

#[test]
fn test_passphrase_protected_export() {
    let dir = tempfile::tempdir().unwrap();
    let a = node(&dir, "a");
    let b = node(&dir, "b");
    let c = node(&dir, "c");
    let a_key = a.messenger().get_active_key();

    c.messenger().send_message("sealed", "twice", &a_key).unwrap();
    let blocks = c.generate(1).unwrap();
    sync(&blocks, &[&a, &b]);

    let exported = dir.path().join("a-key.json");
    a.messenger().export_key(&exported, Some("pass phrase")).unwrap();

    assert!(matches!(
        b.messenger().import_key(&exported, Some("pass"), true),
        Err(MessengerError::WrongPassphrase(_))
    ));
    assert!(subjects(&b).is_empty());

    b.messenger().import_key(&exported, Some("pass phrase"), true).unwrap();
    assert_eq!(subjects(&b), ["sealed"]);
}

#[test]
fn test_rescan_keeps_blocks_connected_while_it_runs() {
    let dir = tempfile::tempdir().unwrap();
    let a = node(&dir, "a");
    let b = node(&dir, "b");
    let a_key = a.messenger().get_active_key();
    let exported = dir.path().join("a-key.json");
    a.messenger().export_key(&exported, None).unwrap();

    // A backlog of messages to a's key makes the rescan take a while.
    for i in 0..4 {
        a.messenger().send_message(&format!("old {i}"), "", &a_key).unwrap();
        a.generate(1).unwrap();
    }
    let backlog: Vec<_> = (1..=4)
        .map(|h| a.service().store().block_at(h).unwrap().unwrap())
        .collect();
    sync(&backlog, &[&b]);

    // Blocks for b to connect while it imports and rescans.
    let mut incoming = Vec::new();
    for i in 0..3 {
        a.messenger().send_message(&format!("new {i}"), "", &a_key).unwrap();
        incoming.extend(a.generate(1).unwrap());
    }

    std::thread::scope(|s| {
        let b = &b;
        let relay = s.spawn(move || sync(&incoming, &[b]));
        b.messenger().import_key(&exported, None, true).unwrap();
        relay.join().unwrap();
    });

    // Whatever the interleaving, b ends up holding every message, exactly
    // as a fresh rescan would find them.
    let held = subjects(&b);
    assert_eq!(held, subjects(&a));
    assert_eq!(held.len(), 7);
    b.messenger().inbox().rescan(&**b.service().store()).unwrap();
    assert_eq!(subjects(&b), held);
}
