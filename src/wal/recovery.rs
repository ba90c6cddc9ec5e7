//! WAL Recovery
//!
//! Reads back the valid prefix of a WAL after a crash.

use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::error::Result;

use super::reader::{Frame, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of complete entries that failed validation.
    /// Reading stops at the first one, so this is 0 or 1.
    pub entries_corrupted: u64,

    /// Last valid LSN (0 if none)
    pub last_lsn: u64,

    /// Whether bytes after the valid prefix were (or would be) cut off
    pub was_truncated: bool,
}

struct Scan {
    entries: Vec<WalEntry>,
    result: RecoveryResult,
    valid_len: u64,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted entry
    /// 3. Truncate the file after the last valid entry
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let scan = Self::scan(path, true)?;

        if scan.result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(scan.valid_len)?;
            file.sync_all()?;
            warn!(
                path = %path.display(),
                valid_len = scan.valid_len,
                corrupted = scan.result.entries_corrupted,
                "truncated WAL after last valid entry"
            );
        }

        Ok((scan.entries, scan.result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Ok(Self::scan(path, false)?.result)
    }

    fn scan(path: &Path, collect: bool) -> Result<Scan> {
        let file_len = std::fs::metadata(path)?.len();
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_frame()? {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if collect {
                        entries.push(entry);
                    }
                }
                Frame::Eof | Frame::Torn => break,
                Frame::Corrupt(reason) => {
                    warn!(path = %path.display(), %reason, "corrupted WAL entry");
                    result.entries_corrupted += 1;
                    break;
                }
            }
        }

        let valid_len = reader.position();
        result.was_truncated = valid_len < file_len;

        Ok(Scan {
            entries,
            result,
            valid_len,
        })
    }
}
