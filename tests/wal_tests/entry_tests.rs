//! Tests for WAL entries
//!
//! These tests verify:
//! - Frame layout (header + payload)
//! - CRC validation on decode
//! - Rejection of malformed frames

use tabulakv::substrate::{RecordLocator, TransactionId};
use tabulakv::wal::{Operation, WalEntry, HEADER_SIZE};
use tabulakv::TabulaError;

fn insert_entry(lsn: u64) -> WalEntry {
    WalEntry::new(
        lsn,
        TransactionId(3),
        Operation::Insert {
            locator: RecordLocator::new(2, 0),
            key: b"edge".to_vec(),
            value: b"weight".to_vec(),
        },
    )
}

// =============================================================================
// Frame Layout
// =============================================================================

#[test]
fn test_frame_header_fields() {
    let entry = insert_entry(42);
    let frame = entry.serialize().unwrap();

    assert!(frame.len() > HEADER_SIZE);
    assert_eq!(u64::from_le_bytes(frame[0..8].try_into().unwrap()), 42);

    let crc = u32::from_le_bytes(frame[8..12].try_into().unwrap());
    assert_eq!(crc, WalEntry::compute_crc(&frame[HEADER_SIZE..]));

    let len = u32::from_le_bytes(frame[12..16].try_into().unwrap()) as usize;
    assert_eq!(len, frame.len() - HEADER_SIZE);
}

#[test]
fn test_decode_preserves_transaction_and_operation() {
    let entry = insert_entry(7);
    let decoded = WalEntry::deserialize(&entry.serialize().unwrap()).unwrap();

    assert_eq!(decoded, entry);
    assert_eq!(decoded.xid, TransactionId(3));
}

#[test]
fn test_terminal_operations() {
    assert!(Operation::Commit.is_terminal());
    assert!(Operation::Abort.is_terminal());
    assert!(!Operation::CreateHash {
        locator: RecordLocator::ROOT
    }
    .is_terminal());
}

// =============================================================================
// Corruption Detection
// =============================================================================

#[test]
fn test_flipped_payload_byte_fails_crc() {
    let mut frame = insert_entry(1).serialize().unwrap();
    let last = frame.len() - 1;
    frame[last] ^= 0xFF;

    let result = WalEntry::deserialize(&frame);
    assert!(matches!(result, Err(TabulaError::WalCorruption(_))));
}

#[test]
fn test_short_frame_rejected() {
    let frame = insert_entry(1).serialize().unwrap();

    let result = WalEntry::deserialize(&frame[..HEADER_SIZE - 1]);
    assert!(matches!(result, Err(TabulaError::WalCorruption(_))));
}

#[test]
fn test_length_mismatch_rejected() {
    let frame = insert_entry(1).serialize().unwrap();

    // Drop the last payload byte: header length no longer matches
    let result = WalEntry::deserialize(&frame[..frame.len() - 1]);
    assert!(matches!(result, Err(TabulaError::WalCorruption(_))));
}
