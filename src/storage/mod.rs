//! Storage Module
//!
//! Checkpoint files: a full image of every hash structure, written so the
//! WAL can be truncated.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header (30 bytes)                                            │
//! │   Magic: "TBKV" (4) | Version: u16 (2)                       │
//! │   CheckpointLSN: u64 (8) | NextXid: u64 (8) | Count: u64 (8) │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Body (variable, one block per structure)                     │
//! │   [Major: u64][Minor: u64][EntryCount: u64]                  │
//! │   [KeyLen: u32][ValLen: u32][Key][Value] ... per entry       │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Footer (4 bytes)                                             │
//! │   CRC: u32 over Header then Body                             │
//! └──────────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod reader;

pub use builder::CheckpointBuilder;
pub use reader::{CheckpointImage, CheckpointReader};

// =============================================================================
// Shared Constants (used by builder and reader)
// =============================================================================

/// Magic bytes identifying a TabulaKV checkpoint file
pub(crate) const MAGIC: &[u8; 4] = b"TBKV";

/// Current checkpoint format version
pub(crate) const VERSION: u16 = 1;

/// Header size: Magic (4) + Version (2) + LSN (8) + NextXid (8) + Count (8)
pub(crate) const HEADER_SIZE: usize = 30;

/// Offset of the structure count inside the header
pub(crate) const COUNT_OFFSET: usize = 22;

/// Footer size: CRC (4)
pub(crate) const FOOTER_SIZE: usize = 4;
