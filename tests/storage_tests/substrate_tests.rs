//! Tests for FileSubstrate
//!
//! These tests verify:
//! - Root placement of the first structure
//! - Transactional insert/remove with abort undo
//! - Crash recovery redoes committed work only
//! - Native cursor protocol and snapshots
//! - Checkpoints and the WAL they truncate

use std::path::Path;

use tabulakv::config::{Config, WalSyncStrategy};
use tabulakv::substrate::{RecordLocator, RecordType, TransactionId};
use tabulakv::{FileSubstrate, Substrate, TabulaError};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_config(dir: &Path) -> Config {
    Config::builder()
        .data_dir(dir)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .build()
}

fn setup_temp_substrate() -> (TempDir, FileSubstrate) {
    let temp_dir = TempDir::new().unwrap();
    let substrate = FileSubstrate::open(&test_config(temp_dir.path())).unwrap();
    (temp_dir, substrate)
}

fn lookup(substrate: &FileSubstrate, locator: RecordLocator, key: &[u8]) -> Option<Vec<u8>> {
    substrate.lookup(TransactionId::DETACHED, locator, key).unwrap()
}

// =============================================================================
// Structure Placement
// =============================================================================

#[test]
fn test_first_structure_lands_on_root() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();

    let root = substrate.root_record();
    assert_eq!(root, RecordLocator::ROOT);
    assert_eq!(substrate.record_type(xid, root).unwrap(), RecordType::Uninitialized);

    assert_eq!(substrate.create_hash(xid).unwrap(), root);
    assert_eq!(substrate.record_type(xid, root).unwrap(), RecordType::HashStructure);
    assert_eq!(substrate.create_hash(xid).unwrap(), RecordLocator::new(2, 0));
}

#[test]
fn test_aborted_create_frees_the_page() {
    let (_temp, substrate) = setup_temp_substrate();

    let xid = substrate.begin().unwrap();
    substrate.create_hash(xid).unwrap();
    substrate.abort(xid).unwrap();

    assert_eq!(substrate.structure_count(), 0);
    let xid = substrate.begin().unwrap();
    assert_eq!(substrate.create_hash(xid).unwrap(), RecordLocator::ROOT);
}

// =============================================================================
// Transaction Tests
// =============================================================================

#[test]
fn test_insert_returns_prior_value() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();

    assert_eq!(substrate.insert(xid, locator, b"k", b"v1").unwrap(), None);
    assert_eq!(substrate.insert(xid, locator, b"k", b"v2").unwrap(), Some(b"v1".to_vec()));
    assert_eq!(substrate.cardinality(xid, locator).unwrap(), 1);
    assert_eq!(lookup(&substrate, locator, b"k"), Some(b"v2".to_vec()));
}

#[test]
fn test_remove_absent_key() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();
    let before = substrate.wal_size_bytes();

    assert_eq!(substrate.remove(xid, locator, b"missing").unwrap(), None);
    assert_eq!(substrate.wal_size_bytes(), before);
}

#[test]
fn test_abort_restores_prior_state() {
    let (_temp, substrate) = setup_temp_substrate();

    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();
    substrate.insert(xid, locator, b"a", b"1").unwrap();
    substrate.insert(xid, locator, b"b", b"2").unwrap();
    substrate.commit(xid).unwrap();

    let xid = substrate.begin().unwrap();
    substrate.insert(xid, locator, b"a", b"changed").unwrap();
    substrate.remove(xid, locator, b"b").unwrap();
    substrate.insert(xid, locator, b"c", b"3").unwrap();
    substrate.abort(xid).unwrap();

    assert_eq!(lookup(&substrate, locator, b"a"), Some(b"1".to_vec()));
    assert_eq!(lookup(&substrate, locator, b"b"), Some(b"2".to_vec()));
    assert_eq!(lookup(&substrate, locator, b"c"), None);
    assert_eq!(substrate.active_transaction_count(), 0);
}

#[test]
fn test_mutation_requires_active_transaction() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();
    substrate.commit(xid).unwrap();

    let result = substrate.insert(TransactionId::DETACHED, locator, b"k", b"v");
    assert!(matches!(result, Err(TabulaError::Storage(_))));

    // Committed transactions are no longer active either
    let result = substrate.insert(xid, locator, b"k", b"v");
    assert!(matches!(result, Err(TabulaError::Storage(_))));
    assert!(matches!(substrate.commit(xid), Err(TabulaError::Storage(_))));
}

#[test]
fn test_lookup_on_missing_structure_fails() {
    let (_temp, substrate) = setup_temp_substrate();

    let result = substrate.lookup(TransactionId::DETACHED, RecordLocator::new(9, 0), b"k");
    assert!(matches!(result, Err(TabulaError::Storage(_))));
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_committed_work_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let locator = {
        let substrate = FileSubstrate::open(&config).unwrap();
        let xid = substrate.begin().unwrap();
        let locator = substrate.create_hash(xid).unwrap();
        substrate.insert(xid, locator, b"k1", b"v1").unwrap();
        substrate.commit(xid).unwrap();
        locator
    };

    let substrate = FileSubstrate::open(&config).unwrap();
    assert_eq!(substrate.record_type(TransactionId::DETACHED, locator).unwrap(), RecordType::HashStructure);
    assert_eq!(lookup(&substrate, locator, b"k1"), Some(b"v1".to_vec()));
}

#[test]
fn test_uncommitted_work_discarded_on_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let (locator, last_xid) = {
        let substrate = FileSubstrate::open(&config).unwrap();
        let xid = substrate.begin().unwrap();
        let locator = substrate.create_hash(xid).unwrap();
        substrate.insert(xid, locator, b"k1", b"v1").unwrap();
        substrate.commit(xid).unwrap();

        // Simulated crash: no commit marker for this one
        let xid = substrate.begin().unwrap();
        substrate.insert(xid, locator, b"k2", b"v2").unwrap();
        substrate.create_hash(xid).unwrap();
        (locator, xid)
    };

    let substrate = FileSubstrate::open(&config).unwrap();
    assert_eq!(lookup(&substrate, locator, b"k1"), Some(b"v1".to_vec()));
    assert_eq!(lookup(&substrate, locator, b"k2"), None);
    assert_eq!(substrate.structure_count(), 1);

    // Transaction ids are never reused
    assert!(substrate.begin().unwrap() > last_xid);
}

#[test]
fn test_aborted_work_not_redone() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let locator = {
        let substrate = FileSubstrate::open(&config).unwrap();
        let xid = substrate.begin().unwrap();
        let locator = substrate.create_hash(xid).unwrap();
        substrate.commit(xid).unwrap();

        let xid = substrate.begin().unwrap();
        substrate.insert(xid, locator, b"gone", b"x").unwrap();
        substrate.abort(xid).unwrap();
        locator
    };

    let substrate = FileSubstrate::open(&config).unwrap();
    assert_eq!(substrate.cardinality(TransactionId::DETACHED, locator).unwrap(), 0);
}

// =============================================================================
// Cursor Tests
// =============================================================================

#[test]
fn test_cursor_protocol() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();
    for i in 0..3u8 {
        substrate.insert(xid, locator, &[b'k', i], &[b'v', i]).unwrap();
    }

    let token = substrate.open_cursor(TransactionId::DETACHED, locator).unwrap();
    assert_eq!(substrate.open_cursor_count(), 1);

    // Not positioned before the first advance
    assert!(substrate.cursor_key(token).is_err());

    let mut seen = Vec::new();
    while substrate.cursor_advance(token).unwrap() {
        let key = substrate.cursor_key(token).unwrap();
        let value = substrate.cursor_value(token).unwrap();
        assert_eq!(value[1], key[1]);
        seen.push(key);
    }
    seen.sort();
    assert_eq!(seen, vec![b"k\x00".to_vec(), b"k\x01".to_vec(), b"k\x02".to_vec()]);

    substrate.cursor_close(token).unwrap();
    assert_eq!(substrate.open_cursor_count(), 0);
    assert!(substrate.cursor_close(token).is_err());
}

#[test]
fn test_cursor_reads_snapshot() {
    let (_temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    let locator = substrate.create_hash(xid).unwrap();
    substrate.insert(xid, locator, b"a", b"1").unwrap();

    let token = substrate.open_cursor(TransactionId::DETACHED, locator).unwrap();
    substrate.insert(xid, locator, b"b", b"2").unwrap();

    let mut count = 0;
    while substrate.cursor_advance(token).unwrap() {
        count += 1;
    }
    assert_eq!(count, 1);
    substrate.cursor_close(token).unwrap();
}

// =============================================================================
// Checkpoint Tests
// =============================================================================

#[test]
fn test_commit_past_threshold_checkpoints() {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .checkpoint_threshold_bytes(1)
        .build();

    let locator = {
        let substrate = FileSubstrate::open(&config).unwrap();
        let xid = substrate.begin().unwrap();
        let locator = substrate.create_hash(xid).unwrap();
        substrate.insert(xid, locator, b"k", b"v").unwrap();
        substrate.commit(xid).unwrap();

        assert_eq!(substrate.wal_size_bytes(), 0);
        assert!(temp_dir.path().join("checkpoint.dat").exists());

        // Work logged after the checkpoint is replayed on top of it
        let xid = substrate.begin().unwrap();
        substrate.insert(xid, locator, b"k2", b"v2").unwrap();
        substrate.commit(xid).unwrap();
        locator
    };

    let substrate = FileSubstrate::open(&config).unwrap();
    assert_eq!(lookup(&substrate, locator, b"k"), Some(b"v".to_vec()));
    assert_eq!(lookup(&substrate, locator, b"k2"), Some(b"v2".to_vec()));
}

#[test]
fn test_checkpoint_skipped_with_uncommitted_changes() {
    let (temp, substrate) = setup_temp_substrate();
    let xid = substrate.begin().unwrap();
    substrate.create_hash(xid).unwrap();

    assert!(!substrate.checkpoint().unwrap());
    assert!(!temp.path().join("checkpoint.dat").exists());

    substrate.commit(xid).unwrap();
    // An idle but open transaction does not block a checkpoint
    let _idle = substrate.begin().unwrap();
    assert!(substrate.checkpoint().unwrap());
    assert_eq!(substrate.wal_size_bytes(), 0);
}

#[test]
fn test_reopen_after_checkpoint_without_wal_entries() {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());

    let last_xid = {
        let substrate = FileSubstrate::open(&config).unwrap();
        let xid = substrate.begin().unwrap();
        let locator = substrate.create_hash(xid).unwrap();
        substrate.insert(xid, locator, b"k", b"v").unwrap();
        substrate.commit(xid).unwrap();
        assert!(substrate.checkpoint().unwrap());
        xid
    };

    let substrate = FileSubstrate::open(&config).unwrap();
    assert_eq!(lookup(&substrate, RecordLocator::ROOT, b"k"), Some(b"v".to_vec()));
    assert!(substrate.begin().unwrap() > last_xid);
}
