//! Transaction Context
//!
//! The active transaction id plus a dirty flag, shared by every table opened
//! in one session. All access goes through a single coarse mutex.

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;
use crate::substrate::{Substrate, TransactionId};

/// State guarded by the [`TransactionContext`] lock
#[derive(Debug)]
pub struct TxnState {
    xid: TransactionId,
    dirty: bool,
}

impl TxnState {
    pub fn xid(&self) -> TransactionId {
        self.xid
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record that the active transaction has pending writes
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Commit if there are pending writes, then start a fresh transaction.
    /// Returns whether anything was committed.
    pub fn commit(&mut self, substrate: &dyn Substrate) -> Result<bool> {
        if !self.dirty {
            return Ok(false);
        }
        substrate.commit(self.xid)?;
        let committed = self.xid;
        self.xid = substrate.begin()?;
        self.dirty = false;
        debug!(%committed, next = %self.xid, "session transaction committed");
        Ok(true)
    }

    /// Abort the active transaction and start a fresh one
    pub fn abort(&mut self, substrate: &dyn Substrate) -> Result<()> {
        substrate.abort(self.xid)?;
        let aborted = self.xid;
        self.xid = substrate.begin()?;
        self.dirty = false;
        debug!(%aborted, next = %self.xid, "session transaction aborted");
        Ok(())
    }
}

/// Process-side handle to the substrate transaction a session writes under
pub struct TransactionContext {
    state: Mutex<TxnState>,
}

impl TransactionContext {
    /// Begin a substrate transaction and wrap it
    pub fn begin(substrate: &dyn Substrate) -> Result<Self> {
        let xid = substrate.begin()?;
        Ok(Self {
            state: Mutex::new(TxnState { xid, dirty: false }),
        })
    }

    /// Exclusive access for the duration of an operation
    pub fn lock(&self) -> MutexGuard<'_, TxnState> {
        self.state.lock()
    }

    pub fn xid(&self) -> TransactionId {
        self.state.lock().xid
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }
}
