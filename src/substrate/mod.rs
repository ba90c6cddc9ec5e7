//! Storage Substrate Module
//!
//! The record-oriented, transactional layer that tables are built on.
//!
//! ## Responsibilities
//! - Transaction begin/commit/abort
//! - A well-known root record and typed record inspection
//! - Hash-structure primitives (create, insert, remove, lookup, cardinality)
//! - Native cursors over a hash structure (open, advance, read, close)
//!
//! The table layer only ever talks to the [`Substrate`] trait. [`FileSubstrate`]
//! is the durable implementation shipped with the crate.

mod file;
mod hash;
mod locator;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use file::FileSubstrate;
pub use hash::HashStructure;
pub use locator::RecordLocator;

/// Identifier of a substrate transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Reads performed outside any specific transaction. They see live state.
    pub const DETACHED: TransactionId = TransactionId(u64::MAX);

    pub fn is_detached(&self) -> bool {
        *self == Self::DETACHED
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_detached() {
            write!(f, "xid:detached")
        } else {
            write!(f, "xid:{}", self.0)
        }
    }
}

/// Physical type of the record at a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordType {
    /// Reserved sentinel: no structure present yet
    Uninitialized,
    /// A hash structure's control block
    HashStructure,
}

/// Opaque handle to a native cursor owned by the substrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CursorToken(pub u64);

/// Collaborator interface consumed by the table layer
///
/// Implementations must be crash-safe and transactional. Failures are
/// reported as [`crate::TabulaError::Storage`] (or I/O) and are propagated
/// to callers unchanged.
pub trait Substrate: Send + Sync {
    fn begin(&self) -> Result<TransactionId>;
    fn commit(&self, xid: TransactionId) -> Result<()>;
    fn abort(&self, xid: TransactionId) -> Result<()>;

    fn root_record(&self) -> RecordLocator;
    fn record_type(&self, xid: TransactionId, locator: RecordLocator) -> Result<RecordType>;

    fn create_hash(&self, xid: TransactionId) -> Result<RecordLocator>;

    /// Upsert; returns the prior value, if any
    fn insert(
        &self,
        xid: TransactionId,
        locator: RecordLocator,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>>;

    /// Returns the removed value, if any
    fn remove(&self, xid: TransactionId, locator: RecordLocator, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn lookup(&self, xid: TransactionId, locator: RecordLocator, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn cardinality(&self, xid: TransactionId, locator: RecordLocator) -> Result<u64>;

    fn open_cursor(&self, xid: TransactionId, locator: RecordLocator) -> Result<CursorToken>;
    /// Moves to the next pair; false once the structure is exhausted
    fn cursor_advance(&self, token: CursorToken) -> Result<bool>;
    fn cursor_key(&self, token: CursorToken) -> Result<Vec<u8>>;
    fn cursor_value(&self, token: CursorToken) -> Result<Vec<u8>>;
    fn cursor_close(&self, token: CursorToken) -> Result<()>;

    // -------------------------------------------------------------------------
    // Maintenance (optional)
    // -------------------------------------------------------------------------

    /// Compact the log into a checkpoint if possible; returns whether one
    /// was written
    fn checkpoint(&self) -> Result<bool> {
        Ok(false)
    }

    /// Force logged work to stable storage
    fn sync(&self) -> Result<()> {
        Ok(())
    }
}
