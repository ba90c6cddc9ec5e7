//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};
use crate::substrate::{RecordLocator, TransactionId};

/// Frame header: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single frame's payload; anything larger is corruption
pub const MAX_ENTRY_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Transaction the operation belongs to
    pub xid: TransactionId,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// A new, empty hash structure at `locator`
    CreateHash { locator: RecordLocator },

    /// Upsert a key-value pair
    Insert {
        locator: RecordLocator,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    /// Remove a key
    Remove { locator: RecordLocator, key: Vec<u8> },

    /// Transaction committed
    Commit,

    /// Transaction aborted
    Abort,
}

impl Operation {
    /// Commit and abort markers end a transaction and are always synced
    pub fn is_terminal(&self) -> bool {
        matches!(self, Operation::Commit | Operation::Abort)
    }
}

impl WalEntry {
    pub fn new(lsn: u64, xid: TransactionId, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            xid,
            operation,
            timestamp,
        }
    }

    /// Encode as a full frame: header followed by payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let data = bincode::serialize(self)?;
        if data.len() as u64 > MAX_ENTRY_SIZE as u64 {
            return Err(TabulaError::Storage(format!(
                "WAL entry of {} bytes exceeds maximum of {}",
                data.len(),
                MAX_ENTRY_SIZE
            )));
        }

        let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
        frame.extend_from_slice(&self.lsn.to_le_bytes());
        frame.extend_from_slice(&Self::compute_crc(&data).to_le_bytes());
        frame.extend_from_slice(&(data.len() as u32).to_le_bytes());
        frame.extend_from_slice(&data);
        Ok(frame)
    }

    /// Decode a full frame produced by [`WalEntry::serialize`]
    pub fn deserialize(frame: &[u8]) -> Result<Self> {
        if frame.len() < HEADER_SIZE {
            return Err(TabulaError::WalCorruption(format!(
                "frame of {} bytes is shorter than the header",
                frame.len()
            )));
        }
        let lsn = u64::from_le_bytes(le_array(&frame[0..8]));
        let crc = u32::from_le_bytes(le_array(&frame[8..12]));
        let len = u32::from_le_bytes(le_array(&frame[12..16])) as usize;

        let data = &frame[HEADER_SIZE..];
        if data.len() != len {
            return Err(TabulaError::WalCorruption(format!(
                "frame payload is {} bytes, header says {}",
                data.len(),
                len
            )));
        }
        Self::decode_payload(lsn, crc, data)
    }

    /// Validate and decode a payload against its header fields
    pub(super) fn decode_payload(lsn: u64, crc: u32, data: &[u8]) -> Result<Self> {
        let actual = Self::compute_crc(data);
        if actual != crc {
            return Err(TabulaError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:#010x}, computed {:#010x}",
                lsn, crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(data)
            .map_err(|e| TabulaError::WalCorruption(format!("undecodable entry at LSN {}: {}", lsn, e)))?;
        if entry.lsn != lsn {
            return Err(TabulaError::WalCorruption(format!(
                "header LSN {} does not match entry LSN {}",
                lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    pub fn compute_crc(data: &[u8]) -> u32 {
        crc32fast::hash(data)
    }
}

pub(super) fn le_array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}
