//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, TabulaError};

use super::entry::le_array;
use super::{WalEntry, HEADER_SIZE, MAX_ENTRY_SIZE};

/// Outcome of reading one frame
#[derive(Debug)]
pub(super) enum Frame {
    /// A valid entry
    Entry(WalEntry),
    /// Clean end of file on a frame boundary
    Eof,
    /// The file ends in the middle of a frame (partial write)
    Torn,
    /// A complete frame that failed validation
    Corrupt(String),
}

/// Reads entries from the WAL file
pub struct WalReader {
    file: BufReader<File>,
    /// Offset just past the last valid entry
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns:
    /// - `Ok(Some(entry))`: a valid entry
    /// - `Ok(None)`: clean end of log
    /// - `Err(WalCorruption)`: torn tail or failed checksum
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::Eof => Ok(None),
            Frame::Torn => Err(TabulaError::WalCorruption(format!(
                "partial entry after offset {}",
                self.position
            ))),
            Frame::Corrupt(reason) => Err(TabulaError::WalCorruption(reason)),
        }
    }

    /// Iterate over all valid entries, stopping after the first error
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Offset just past the last valid entry read so far
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(super) fn next_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; HEADER_SIZE];
        let n = read_full(&mut self.file, &mut header)?;
        if n == 0 {
            return Ok(Frame::Eof);
        }
        if n < HEADER_SIZE {
            return Ok(Frame::Torn);
        }

        let lsn = u64::from_le_bytes(le_array(&header[0..8]));
        let crc = u32::from_le_bytes(le_array(&header[8..12]));
        let len = u32::from_le_bytes(le_array(&header[12..16]));
        if len > MAX_ENTRY_SIZE {
            return Ok(Frame::Corrupt(format!(
                "entry length {} at offset {} exceeds maximum",
                len, self.position
            )));
        }

        let mut data = vec![0u8; len as usize];
        if read_full(&mut self.file, &mut data)? < data.len() {
            return Ok(Frame::Torn);
        }

        match WalEntry::decode_payload(lsn, crc, &data) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + data.len()) as u64;
                Ok(Frame::Entry(entry))
            }
            Err(e) => Ok(Frame::Corrupt(e.to_string())),
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the file allows; returns the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
