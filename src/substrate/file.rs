//! File-backed substrate
//!
//! Hash structures live in memory; the WAL and checkpoint files make them
//! durable and transactional.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{Result, TabulaError};
use crate::storage::{CheckpointBuilder, CheckpointReader};
use crate::wal::{Operation, WalEntry, WalRecovery, WalWriter};

use super::{CursorToken, HashStructure, RecordLocator, RecordType, Substrate, TransactionId};

/// Durable [`Substrate`] implementation
///
/// ## Concurrency:
/// - `state`: RwLock; mutations take it exclusively, reads share it
/// - `wal`: only ever locked while `state` is held for writing
/// - `cursors`: independent of both; cursors read from a snapshot
///
/// ## Recovery:
/// 1. Load the last checkpoint (if any)
/// 2. Read the valid WAL prefix, truncating a torn tail
/// 3. Redo transactions whose commit marker is in the log, in commit order
pub struct FileSubstrate {
    /// Root directory for the WAL and checkpoint
    data_dir: PathBuf,

    checkpoint_path: PathBuf,

    /// WAL size that makes a commit attempt a checkpoint
    checkpoint_threshold: u64,

    /// Structures, active transactions and id counters
    state: RwLock<SubstrateState>,

    /// Write-ahead log (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Open native cursors by token
    cursors: Mutex<HashMap<u64, NativeCursor>>,

    next_cursor: AtomicU64,
}

#[derive(Default)]
struct SubstrateState {
    structures: HashMap<RecordLocator, HashStructure>,
    /// Undo list per active transaction, oldest first
    active: HashMap<TransactionId, Vec<Undo>>,
    next_xid: u64,
}

enum Undo {
    Created(RecordLocator),
    Restore {
        locator: RecordLocator,
        key: Bytes,
        prior: Option<Bytes>,
    },
}

/// Snapshot taken at cursor open, walked one pair at a time
struct NativeCursor {
    pairs: Vec<(Bytes, Bytes)>,
    current: Option<usize>,
    next: usize,
}

impl FileSubstrate {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const CHECKPOINT_FILENAME: &'static str = "checkpoint.dat";

    /// Open or create a substrate in `config.data_dir`
    pub fn open(config: &Config) -> Result<Self> {
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let checkpoint_path = config.data_dir.join(Self::CHECKPOINT_FILENAME);

        let image = CheckpointReader::load(&checkpoint_path)?.unwrap_or_default();
        let mut state = SubstrateState {
            structures: image.structures,
            active: HashMap::new(),
            next_xid: image.next_xid.max(1),
        };
        let mut last_lsn = image.checkpoint_lsn;

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;
            let replay = Self::replay(&mut state, entries, image.checkpoint_lsn);

            info!(
                entries_recovered = recovery.entries_recovered,
                entries_corrupted = recovery.entries_corrupted,
                was_truncated = recovery.was_truncated,
                committed = replay.committed,
                discarded = replay.discarded,
                last_lsn = recovery.last_lsn,
                "WAL recovery complete"
            );
            last_lsn = last_lsn.max(recovery.last_lsn);
        }

        let mut wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;
        wal.advance_past(last_lsn);

        info!(
            data_dir = %config.data_dir.display(),
            structures = state.structures.len(),
            next_xid = state.next_xid,
            "substrate opened"
        );

        Ok(Self {
            data_dir: config.data_dir.clone(),
            checkpoint_path,
            checkpoint_threshold: config.checkpoint_threshold_bytes,
            state: RwLock::new(state),
            wal: Mutex::new(wal),
            cursors: Mutex::new(HashMap::new()),
            next_cursor: AtomicU64::new(1),
        })
    }

    /// Redo committed transactions found after the checkpoint
    fn replay(state: &mut SubstrateState, entries: Vec<WalEntry>, checkpoint_lsn: u64) -> ReplayStats {
        let mut pending: HashMap<TransactionId, Vec<Operation>> = HashMap::new();
        let mut stats = ReplayStats::default();

        for entry in entries {
            if entry.xid.0 >= state.next_xid && !entry.xid.is_detached() {
                state.next_xid = entry.xid.0 + 1;
            }
            if entry.lsn <= checkpoint_lsn {
                continue;
            }

            match entry.operation {
                Operation::Commit => {
                    for op in pending.remove(&entry.xid).unwrap_or_default() {
                        Self::redo(state, op);
                    }
                    stats.committed += 1;
                }
                Operation::Abort => {
                    pending.remove(&entry.xid);
                }
                op => pending.entry(entry.xid).or_default().push(op),
            }
        }

        stats.discarded = pending.len() as u64;
        stats
    }

    fn redo(state: &mut SubstrateState, op: Operation) {
        match op {
            Operation::CreateHash { locator } => {
                state.structures.entry(locator).or_default();
            }
            Operation::Insert { locator, key, value } => {
                state.structures.entry(locator).or_default().insert(&key, &value);
            }
            Operation::Remove { locator, key } => {
                if let Some(structure) = state.structures.get_mut(&locator) {
                    structure.remove(&key);
                }
            }
            Operation::Commit | Operation::Abort => {}
        }
    }

    /// Write a checkpoint and truncate the WAL
    ///
    /// Skipped (returns false) while any active transaction has uncommitted
    /// changes, since the image must only contain committed state.
    fn checkpoint_locked(&self, state: &SubstrateState, wal: &mut WalWriter) -> Result<bool> {
        if state.active.values().any(|undo| !undo.is_empty()) {
            return Ok(false);
        }

        wal.sync()?;
        let checkpoint_lsn = wal.current_lsn() - 1;
        let mut builder = CheckpointBuilder::new(&self.checkpoint_path, checkpoint_lsn, state.next_xid)?;
        for (locator, structure) in &state.structures {
            builder.add_structure(*locator, structure)?;
        }
        let written = builder.finish()?;
        wal.truncate()?;

        info!(checkpoint_lsn, structures = written, "checkpoint written");
        Ok(true)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Number of hash structures currently present
    pub fn structure_count(&self) -> usize {
        self.state.read().structures.len()
    }

    /// Number of native cursors not yet closed
    pub fn open_cursor_count(&self) -> usize {
        self.cursors.lock().len()
    }

    pub fn active_transaction_count(&self) -> usize {
        self.state.read().active.len()
    }

    pub fn wal_size_bytes(&self) -> u64 {
        self.wal.lock().size_bytes()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn check_active(state: &SubstrateState, xid: TransactionId) -> Result<()> {
        if state.active.contains_key(&xid) {
            Ok(())
        } else {
            Err(TabulaError::Storage(format!("{} is not an active transaction", xid)))
        }
    }

    fn check_readable(state: &SubstrateState, xid: TransactionId) -> Result<()> {
        if xid.is_detached() {
            Ok(())
        } else {
            Self::check_active(state, xid)
        }
    }

    fn structure<'a>(state: &'a SubstrateState, locator: RecordLocator) -> Result<&'a HashStructure> {
        state
            .structures
            .get(&locator)
            .ok_or_else(|| TabulaError::Storage(format!("no hash structure at {}", locator)))
    }

    fn with_cursor<T>(&self, token: CursorToken, f: impl FnOnce(&mut NativeCursor) -> Result<T>) -> Result<T> {
        let mut cursors = self.cursors.lock();
        let cursor = cursors
            .get_mut(&token.0)
            .ok_or_else(|| TabulaError::Storage(format!("unknown cursor {}", token.0)))?;
        f(cursor)
    }

    fn current_pair(cursor: &NativeCursor) -> Result<&(Bytes, Bytes)> {
        cursor
            .current
            .and_then(|i| cursor.pairs.get(i))
            .ok_or_else(|| TabulaError::Storage("cursor is not positioned on a pair".to_string()))
    }
}

#[derive(Default)]
struct ReplayStats {
    committed: u64,
    discarded: u64,
}

impl Substrate for FileSubstrate {
    fn begin(&self) -> Result<TransactionId> {
        let mut state = self.state.write();
        let xid = TransactionId(state.next_xid);
        state.next_xid += 1;
        state.active.insert(xid, Vec::new());
        debug!(%xid, "transaction begun");
        Ok(xid)
    }

    fn commit(&self, xid: TransactionId) -> Result<()> {
        let mut state = self.state.write();
        Self::check_active(&state, xid)?;

        let mut wal = self.wal.lock();
        wal.append(xid, Operation::Commit)?;
        state.active.remove(&xid);
        debug!(%xid, "transaction committed");

        if wal.size_bytes() >= self.checkpoint_threshold {
            self.checkpoint_locked(&state, &mut wal)?;
        }
        Ok(())
    }

    fn abort(&self, xid: TransactionId) -> Result<()> {
        let mut state = self.state.write();
        Self::check_active(&state, xid)?;

        let mut wal = self.wal.lock();
        wal.append(xid, Operation::Abort)?;
        let undo = state.active.remove(&xid).unwrap_or_default();
        let undone = undo.len();
        for step in undo.into_iter().rev() {
            match step {
                Undo::Created(locator) => {
                    state.structures.remove(&locator);
                }
                Undo::Restore { locator, key, prior } => {
                    if let Some(structure) = state.structures.get_mut(&locator) {
                        structure.restore(key, prior);
                    }
                }
            }
        }
        debug!(%xid, undone, "transaction aborted");
        Ok(())
    }

    fn root_record(&self) -> RecordLocator {
        RecordLocator::ROOT
    }

    fn record_type(&self, xid: TransactionId, locator: RecordLocator) -> Result<RecordType> {
        let state = self.state.read();
        Self::check_readable(&state, xid)?;
        if state.structures.contains_key(&locator) {
            Ok(RecordType::HashStructure)
        } else {
            Ok(RecordType::Uninitialized)
        }
    }

    fn create_hash(&self, xid: TransactionId) -> Result<RecordLocator> {
        let mut state = self.state.write();
        Self::check_active(&state, xid)?;

        // Lowest free page: an empty store always places its first structure at ROOT.
        let locator = (RecordLocator::ROOT.major..)
            .map(|page| RecordLocator::new(page, 0))
            .find(|l| !state.structures.contains_key(l))
            .ok_or_else(|| TabulaError::Storage("record address space exhausted".to_string()))?;

        self.wal.lock().append(xid, Operation::CreateHash { locator })?;
        state.structures.insert(locator, HashStructure::new());
        if let Some(undo) = state.active.get_mut(&xid) {
            undo.push(Undo::Created(locator));
        }
        Ok(locator)
    }

    fn insert(
        &self,
        xid: TransactionId,
        locator: RecordLocator,
        key: &[u8],
        value: &[u8],
    ) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.write();
        Self::check_active(&state, xid)?;
        Self::structure(&state, locator)?;

        self.wal.lock().append(
            xid,
            Operation::Insert {
                locator,
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )?;

        let SubstrateState { structures, active, .. } = &mut *state;
        let prior = structures
            .get_mut(&locator)
            .and_then(|structure| structure.insert(key, value));
        if let Some(undo) = active.get_mut(&xid) {
            undo.push(Undo::Restore {
                locator,
                key: Bytes::copy_from_slice(key),
                prior: prior.clone(),
            });
        }
        Ok(prior.map(|b| b.to_vec()))
    }

    fn remove(&self, xid: TransactionId, locator: RecordLocator, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut state = self.state.write();
        Self::check_active(&state, xid)?;
        if Self::structure(&state, locator)?.get(key).is_none() {
            return Ok(None);
        }

        self.wal.lock().append(
            xid,
            Operation::Remove {
                locator,
                key: key.to_vec(),
            },
        )?;

        let SubstrateState { structures, active, .. } = &mut *state;
        let prior = structures
            .get_mut(&locator)
            .and_then(|structure| structure.remove(key));
        if let Some(undo) = active.get_mut(&xid) {
            undo.push(Undo::Restore {
                locator,
                key: Bytes::copy_from_slice(key),
                prior: prior.clone(),
            });
        }
        Ok(prior.map(|b| b.to_vec()))
    }

    fn lookup(&self, xid: TransactionId, locator: RecordLocator, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let state = self.state.read();
        Self::check_readable(&state, xid)?;
        Ok(Self::structure(&state, locator)?.get(key).map(|v| v.to_vec()))
    }

    fn cardinality(&self, xid: TransactionId, locator: RecordLocator) -> Result<u64> {
        let state = self.state.read();
        Self::check_readable(&state, xid)?;
        Ok(Self::structure(&state, locator)?.len() as u64)
    }

    fn open_cursor(&self, xid: TransactionId, locator: RecordLocator) -> Result<CursorToken> {
        let pairs = {
            let state = self.state.read();
            Self::check_readable(&state, xid)?;
            Self::structure(&state, locator)?.snapshot()
        };

        let token = self.next_cursor.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().insert(
            token,
            NativeCursor {
                pairs,
                current: None,
                next: 0,
            },
        );
        Ok(CursorToken(token))
    }

    fn cursor_advance(&self, token: CursorToken) -> Result<bool> {
        self.with_cursor(token, |cursor| {
            if cursor.next < cursor.pairs.len() {
                cursor.current = Some(cursor.next);
                cursor.next += 1;
                Ok(true)
            } else {
                cursor.current = None;
                Ok(false)
            }
        })
    }

    fn cursor_key(&self, token: CursorToken) -> Result<Vec<u8>> {
        self.with_cursor(token, |cursor| Ok(Self::current_pair(cursor)?.0.to_vec()))
    }

    fn cursor_value(&self, token: CursorToken) -> Result<Vec<u8>> {
        self.with_cursor(token, |cursor| Ok(Self::current_pair(cursor)?.1.to_vec()))
    }

    fn cursor_close(&self, token: CursorToken) -> Result<()> {
        match self.cursors.lock().remove(&token.0) {
            Some(_) => Ok(()),
            None => Err(TabulaError::Storage(format!("unknown cursor {}", token.0))),
        }
    }

    fn checkpoint(&self) -> Result<bool> {
        let state = self.state.write();
        let mut wal = self.wal.lock();
        self.checkpoint_locked(&state, &mut wal)
    }

    fn sync(&self) -> Result<()> {
        self.wal.lock().sync()
    }
}
