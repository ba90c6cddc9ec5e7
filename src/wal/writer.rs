//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{Result, TabulaError};
use crate::substrate::TransactionId;

use super::{Operation, WalEntry, WalRecovery};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    file: BufWriter<File>,
    /// LSN assigned to the next appended entry
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
    size_bytes: u64,
}

impl WalWriter {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned first; a torn or corrupt tail is cut off
    /// so new entries never land behind garbage.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let last_lsn = if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            result.last_lsn
        } else {
            0
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let size_bytes = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: BufWriter::new(file),
            next_lsn: last_lsn + 1,
            sync_strategy,
            unsynced: 0,
            size_bytes,
        })
    }

    /// Append an entry to the WAL, returning its LSN
    ///
    /// Commit and abort markers are always synced before returning.
    pub fn append(&mut self, xid: TransactionId, operation: Operation) -> Result<u64> {
        let lsn = self.next_lsn;
        let terminal = operation.is_terminal();
        let frame = WalEntry::new(lsn, xid, operation).serialize()?;

        self.file
            .write_all(&frame)
            .map_err(|e| TabulaError::Storage(format!("WAL append failed at LSN {}: {}", lsn, e)))?;
        self.next_lsn += 1;
        self.size_bytes += frame.len() as u64;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count,
        };
        if terminal || due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all entries. The LSN sequence continues where it was.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.flush()?;
        let file = self.file.get_ref();
        file.set_len(0)?;
        file.sync_all()?;
        self.size_bytes = 0;
        self.unsynced = 0;
        Ok(())
    }

    /// Make sure the next LSN is greater than `lsn`
    pub fn advance_past(&mut self, lsn: u64) {
        if self.next_lsn <= lsn {
            self.next_lsn = lsn + 1;
        }
    }

    /// Get the LSN the next entry will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Bytes currently in the log
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
