//! Table handles
//!
//! An opened table: CRUD and scans over raw key/value byte pairs, plus typed
//! row helpers on top of them.

use std::sync::Arc;

use crate::error::{Result, TabulaError};
use crate::store::Session;
use crate::substrate::{RecordLocator, TransactionId};
use crate::txn::TxnState;

use super::codec::{decode_row, encode_row};
use super::cursor::{RowCursor, TableCursor};
use super::name::QualifiedTableName;
use super::schema::{Row, Schema, Value};

/// An opened named table
///
/// Immutable for its lifetime. Dropping a handle does nothing to the
/// underlying structure, which persists in the substrate.
///
/// ## Locking
/// - `put` / `remove`: hold the session's transaction lock
/// - `get` / `count` / `scan`: no lock; they read live substrate state
#[derive(Clone)]
pub struct TableHandle {
    session: Arc<Session>,
    name: QualifiedTableName,
    locator: RecordLocator,
    schema: Schema,
}

impl TableHandle {
    pub(crate) fn new(
        session: Arc<Session>,
        name: QualifiedTableName,
        locator: RecordLocator,
        schema: Schema,
    ) -> Self {
        Self {
            session,
            name,
            locator,
            schema,
        }
    }

    pub fn name(&self) -> &QualifiedTableName {
        &self.name
    }

    pub fn locator(&self) -> RecordLocator {
        self.locator
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }

    // =========================================================================
    // Raw Operations
    // =========================================================================

    /// Upsert `key` → `value`
    ///
    /// Returns true if there was no prior value or the prior value differed,
    /// false for a redundant write of identical bytes.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        let mut txn = self.session.txn.lock();
        self.put_locked(&mut txn, key, value)
    }

    pub(crate) fn put_locked(&self, txn: &mut TxnState, key: &[u8], value: &[u8]) -> Result<bool> {
        self.check_access(key)?;
        txn.mark_dirty();
        let prior = self
            .session
            .substrate
            .insert(txn.xid(), self.locator, key, value)?;
        Ok(match prior {
            Some(old) => old != value,
            None => true,
        })
    }

    /// Conditional delete: removes `key` only if its current value is
    /// exactly `expected`.
    ///
    /// Returns true only when a matching row was deleted. An absent key or a
    /// different value is a plain `false`, never an error.
    pub fn remove(&self, key: &[u8], expected: &[u8]) -> Result<bool> {
        self.check_access(key)?;
        let mut txn = self.session.txn.lock();
        let substrate = &self.session.substrate;

        match substrate.lookup(txn.xid(), self.locator, key)? {
            Some(current) if current == expected => {
                substrate.remove(txn.xid(), self.locator, key)?;
                txn.mark_dirty();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Point lookup by exact key bytes
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.check_access(key)?;
        self.session
            .substrate
            .lookup(TransactionId::DETACHED, self.locator, key)
    }

    /// Number of rows, read outside any transaction snapshot
    pub fn count(&self) -> Result<u64> {
        if self.locator.is_null() {
            return Err(TabulaError::UninitializedHandle);
        }
        self.session
            .substrate
            .cardinality(TransactionId::DETACHED, self.locator)
    }

    /// Full scan; the cursor must be drained before it is dropped
    pub fn scan(&self) -> Result<TableCursor> {
        if self.locator.is_null() {
            return Err(TabulaError::UninitializedHandle);
        }
        TableCursor::open(Arc::clone(&self.session), self.locator)
    }

    fn check_access(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(TabulaError::EmptyKey);
        }
        if self.locator.is_null() {
            return Err(TabulaError::UninitializedHandle);
        }
        Ok(())
    }

    // =========================================================================
    // Typed Rows
    // =========================================================================

    fn encode(&self, row: &[Value]) -> Result<(Vec<u8>, Vec<u8>)> {
        self.schema.check(row)?;
        let key = encode_row(&self.schema.key.project_key(row)?)?;
        let value = encode_row(&self.schema.key.project_value(row)?)?;
        Ok((key, value))
    }

    /// Type-check, project and [`put`](Self::put) a row
    pub fn insert_row(&self, row: &[Value]) -> Result<bool> {
        let (key, value) = self.encode(row)?;
        self.put(&key, &value)
    }

    /// [`remove`](Self::remove) exactly this row
    pub fn delete_row(&self, row: &[Value]) -> Result<bool> {
        let (key, value) = self.encode(row)?;
        self.remove(&key, &value)
    }

    /// Look up the full row whose key columns equal `key`
    pub fn lookup_row(&self, key: &[Value]) -> Result<Option<Row>> {
        let key_bytes = encode_row(key)?;
        match self.get(&key_bytes)? {
            Some(value) => Ok(Some(
                self.schema.key.reconstruct(key.to_vec(), decode_row(&value)?)?,
            )),
            None => Ok(None),
        }
    }

    /// Full scan decoded into rows
    pub fn rows(&self) -> Result<RowCursor> {
        Ok(RowCursor::new(self.scan()?, self.schema.clone()))
    }
}
