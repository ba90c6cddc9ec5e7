//! Table cursors
//!
//! One-pass, lookahead-by-one pull iterators over a table's hash structure.
//! No ordering is guaranteed.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::warn;

use crate::error::{Result, TabulaError};
use crate::store::Session;
use crate::substrate::{CursorToken, RecordLocator, TransactionId};

use super::codec::decode_row;
use super::schema::{Row, Schema};

/// Raw `(key, value)` scan over one table
///
/// The next pair is always fetched one step ahead, and the native cursor is
/// closed as soon as exhaustion is observed. Dropping a cursor that still has
/// rows left is reported as a leak (a `warn!` plus the store's leaked-cursor
/// counter); the native cursor is closed either way.
///
/// Rows mutated during the scan are not reflected: the substrate hands out a
/// snapshot taken when the cursor opened.
pub struct TableCursor {
    session: Arc<Session>,
    token: CursorToken,
    locator: RecordLocator,
    lookahead: Option<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
    closed: bool,
}

impl TableCursor {
    pub(crate) fn open(session: Arc<Session>, locator: RecordLocator) -> Result<Self> {
        let token = session.substrate.open_cursor(TransactionId::DETACHED, locator)?;
        let mut cursor = Self {
            session,
            token,
            locator,
            lookahead: None,
            exhausted: false,
            closed: false,
        };
        if let Err(e) = cursor.fetch() {
            cursor.exhausted = true;
            cursor.release();
            return Err(e);
        }
        Ok(cursor)
    }

    /// Refill the lookahead slot, or mark exhaustion and release the cursor
    fn fetch(&mut self) -> Result<()> {
        let substrate = &self.session.substrate;
        if substrate.cursor_advance(self.token)? {
            let key = substrate.cursor_key(self.token)?;
            let value = substrate.cursor_value(self.token)?;
            self.lookahead = Some((key, value));
        } else {
            self.lookahead = None;
            self.exhausted = true;
            self.closed = true;
            substrate.cursor_close(self.token)?;
        }
        Ok(())
    }

    /// Whether another pair can be pulled
    pub fn has_next(&self) -> bool {
        !self.exhausted
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Take the held pair and fetch the next one
    ///
    /// Pulling after exhaustion fails with [`TabulaError::CursorExhausted`].
    pub fn pull(&mut self) -> Result<(Vec<u8>, Vec<u8>)> {
        let pair = match self.lookahead.take() {
            Some(pair) => pair,
            None => return Err(TabulaError::CursorExhausted),
        };
        if let Err(e) = self.fetch() {
            // A failed fetch ends the scan; nothing more can be yielded.
            self.exhausted = true;
            self.release();
            return Err(e);
        }
        Ok(pair)
    }

    /// Removal through a cursor is not supported
    pub fn remove(&mut self) -> Result<()> {
        Err(TabulaError::UnsupportedOperation(
            "removal through table cursors",
        ))
    }

    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            let _ = self.session.substrate.cursor_close(self.token);
        }
    }
}

impl Iterator for TableCursor {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            None
        } else {
            Some(self.pull())
        }
    }
}

impl Drop for TableCursor {
    fn drop(&mut self) {
        if !self.exhausted {
            self.session.leaked_cursors.fetch_add(1, Ordering::Relaxed);
            warn!(
                cursor = self.token.0,
                locator = %self.locator,
                "detected non-exhausted table cursor at drop"
            );
        }
        self.release();
    }
}

/// Decodes a [`TableCursor`]'s pairs back into full rows
pub struct RowCursor {
    inner: TableCursor,
    schema: Schema,
}

impl RowCursor {
    pub(crate) fn new(inner: TableCursor, schema: Schema) -> Self {
        Self { inner, schema }
    }

    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    pub fn pull(&mut self) -> Result<Row> {
        let (key, value) = self.inner.pull()?;
        self.schema
            .key
            .reconstruct(decode_row(&key)?, decode_row(&value)?)
    }
}

impl Iterator for RowCursor {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.inner.has_next() {
            Some(self.pull())
        } else {
            None
        }
    }
}
