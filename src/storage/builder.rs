//! Checkpoint Builder
//!
//! Writes every hash structure into a new checkpoint file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, TabulaError};
use crate::substrate::{HashStructure, RecordLocator};

use super::{COUNT_OFFSET, HEADER_SIZE, MAGIC, VERSION};

/// Builder for checkpoint files
///
/// Writes to `<path>.tmp` and renames over `path` in `finish()`, so a crash
/// mid-checkpoint leaves the previous checkpoint intact.
pub struct CheckpointBuilder {
    /// Final file path
    path: PathBuf,
    /// Temporary file being written
    tmp_path: PathBuf,
    /// Buffered writer for performance
    writer: BufWriter<File>,
    checkpoint_lsn: u64,
    next_xid: u64,
    /// Number of structures written
    structure_count: u64,
    /// Running CRC hasher for the body
    body_hasher: crc32fast::Hasher,
}

impl CheckpointBuilder {
    /// Create a new checkpoint builder
    ///
    /// Writes the header immediately; call `add_structure()` for each
    /// structure, then `finish()`.
    pub fn new(path: &Path, checkpoint_lsn: u64, next_xid: u64) -> Result<Self> {
        let tmp_path = path.with_extension("tmp");
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // Structure count is a placeholder, patched in finish
        writer.write_all(&encode_header(checkpoint_lsn, next_xid, 0))?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer,
            checkpoint_lsn,
            next_xid,
            structure_count: 0,
            body_hasher: crc32fast::Hasher::new(),
        })
    }

    /// Append one structure and all of its entries
    pub fn add_structure(&mut self, locator: RecordLocator, structure: &HashStructure) -> Result<()> {
        self.write_body(&locator.major.to_le_bytes())?;
        self.write_body(&locator.minor.to_le_bytes())?;
        self.write_body(&(structure.len() as u64).to_le_bytes())?;

        for (key, value) in structure.iter() {
            self.write_body(&(key.len() as u32).to_le_bytes())?;
            self.write_body(&(value.len() as u32).to_le_bytes())?;
            self.write_body(key)?;
            self.write_body(value)?;
        }

        self.structure_count += 1;
        Ok(())
    }

    fn write_body(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer.write_all(bytes)?;
        self.body_hasher.update(bytes);
        Ok(())
    }

    /// Finish: write footer, patch the header and move the file into place.
    /// Returns the number of structures written.
    ///
    /// The footer CRC covers the final header followed by the body.
    pub fn finish(mut self) -> Result<u64> {
        let header = encode_header(self.checkpoint_lsn, self.next_xid, self.structure_count);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.combine(&self.body_hasher);
        self.writer.write_all(&hasher.finalize().to_le_bytes())?;
        self.writer.flush()?;

        let mut file = self.writer.into_inner().map_err(|e| {
            TabulaError::Storage(format!("Failed to flush checkpoint: {}", e))
        })?;
        file.seek(SeekFrom::Start(COUNT_OFFSET as u64))?;
        file.write_all(&header[COUNT_OFFSET..])?;
        file.sync_all()?;
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        if let Some(dir) = self.path.parent() {
            // Persist the rename; not every platform can open a directory.
            if let Ok(d) = File::open(dir) {
                let _ = d.sync_all();
            }
        }

        Ok(self.structure_count)
    }
}

fn encode_header(checkpoint_lsn: u64, next_xid: u64, structure_count: u64) -> [u8; HEADER_SIZE] {
    let mut header = [0u8; HEADER_SIZE];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[6..14].copy_from_slice(&checkpoint_lsn.to_le_bytes());
    header[14..COUNT_OFFSET].copy_from_slice(&next_xid.to_le_bytes());
    header[COUNT_OFFSET..].copy_from_slice(&structure_count.to_le_bytes());
    header
}
