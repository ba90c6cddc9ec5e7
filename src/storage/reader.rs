//! Checkpoint Reader
//!
//! Loads and validates a checkpoint file.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::error::{Result, TabulaError};
use crate::substrate::{HashStructure, RecordLocator};

use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Everything a checkpoint holds
#[derive(Debug, Default)]
pub struct CheckpointImage {
    /// Every WAL entry up to this LSN is reflected in `structures`
    pub checkpoint_lsn: u64,
    /// First transaction id not yet handed out
    pub next_xid: u64,
    pub structures: HashMap<RecordLocator, HashStructure>,
}

/// Reader for checkpoint files
pub struct CheckpointReader;

impl CheckpointReader {
    /// Load a checkpoint; `Ok(None)` if none has been written yet
    pub fn load(path: &Path) -> Result<Option<CheckpointImage>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(path)?;
        Self::parse(&data).map(Some)
    }

    fn parse(data: &[u8]) -> Result<CheckpointImage> {
        if data.len() < HEADER_SIZE + FOOTER_SIZE {
            return Err(TabulaError::Storage(format!(
                "Checkpoint too short: {} bytes",
                data.len()
            )));
        }

        if &data[0..4] != MAGIC {
            return Err(TabulaError::Storage(format!(
                "Invalid checkpoint magic: expected TBKV, got {:?}",
                &data[0..4]
            )));
        }

        let mut header = Cursor::new(&data[4..HEADER_SIZE]);
        let version = u16::from_le_bytes(header.take_array()?);
        if version != VERSION {
            return Err(TabulaError::Storage(format!(
                "Unsupported checkpoint version: {}",
                version
            )));
        }
        let checkpoint_lsn = header.u64()?;
        let next_xid = header.u64()?;
        let structure_count = header.u64()?;

        let body = &data[HEADER_SIZE..data.len() - FOOTER_SIZE];
        let mut footer = Cursor::new(&data[data.len() - FOOTER_SIZE..]);
        let stored_crc = footer.u32()?;
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&data[..HEADER_SIZE]);
        hasher.update(body);
        let actual_crc = hasher.finalize();
        if stored_crc != actual_crc {
            return Err(TabulaError::Storage(format!(
                "Checkpoint CRC mismatch: stored {:#010x}, computed {:#010x}",
                stored_crc, actual_crc
            )));
        }

        let mut structures = HashMap::new();
        let mut body = Cursor::new(body);
        for _ in 0..structure_count {
            let locator = RecordLocator::new(body.u64()?, body.u64()?);
            let entry_count = body.u64()?;

            let mut structure = HashStructure::new();
            for _ in 0..entry_count {
                let key_len = body.u32()? as usize;
                let val_len = body.u32()? as usize;
                let key = body.take(key_len)?;
                let value = body.take(val_len)?;
                structure.insert(key, value);
            }
            structures.insert(locator, structure);
        }

        if !body.is_empty() {
            return Err(TabulaError::Storage(
                "Trailing bytes after last checkpoint structure".to_string(),
            ));
        }

        Ok(CheckpointImage {
            checkpoint_lsn,
            next_xid,
            structures,
        })
    }
}

/// Bounds-checked little-endian reader over a byte slice
struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(TabulaError::Storage(format!(
                "Checkpoint truncated: wanted {} bytes at offset {}",
                n, self.pos
            ))),
        }
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take_array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take_array()?))
    }

    fn is_empty(&self) -> bool {
        self.pos == self.data.len()
    }
}
