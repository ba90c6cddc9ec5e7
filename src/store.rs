//! Store Module
//!
//! The entry point that ties a substrate, the session's transaction context
//! and the catalog together.
//!
//! ## Responsibilities
//! - Open the substrate and begin the session transaction
//! - Bootstrap the catalog exactly once, on first use
//! - Open tables by qualified name (scope prefix applied here)
//! - Commit / abort / checkpoint / close

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::info;

use crate::config::Config;
use crate::error::Result;
use crate::substrate::{FileSubstrate, RecordType, Substrate, TransactionId};
use crate::table::{Catalog, CatalogEntry, QualifiedTableName, Schema, TableHandle};
use crate::txn::TransactionContext;

/// State shared by every table handle opened from one [`Store`]
pub(crate) struct Session {
    pub(crate) substrate: Arc<dyn Substrate>,
    pub(crate) txn: TransactionContext,
    /// Cursors dropped before exhaustion
    pub(crate) leaked_cursors: AtomicU64,
}

impl Session {
    /// Begin the session transaction on `substrate`
    pub(crate) fn begin(substrate: Arc<dyn Substrate>) -> Result<Self> {
        let txn = TransactionContext::begin(substrate.as_ref())?;
        Ok(Self {
            substrate,
            txn,
            leaked_cursors: AtomicU64::new(0),
        })
    }
}

/// A persistent collection of named tables
///
/// ## Concurrency Model
/// - Table opens, catalog bootstrap, `put` and `remove` serialize on the
///   session's transaction lock
/// - `get`, `count` and scans take no session lock
/// - The catalog is built once per store behind a `OnceLock`; its
///   bootstrap runs under the transaction lock and is double-checked there
pub struct Store {
    config: Config,
    session: Arc<Session>,
    catalog: OnceLock<Catalog>,
}

impl Store {
    /// Open or create a store backed by files in `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        let substrate = Arc::new(FileSubstrate::open(&config)?);
        Self::with_substrate(config, substrate)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Run the table layer over any substrate implementation
    pub fn with_substrate(config: Config, substrate: Arc<dyn Substrate>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            session: Arc::new(Session::begin(substrate)?),
            catalog: OnceLock::new(),
        })
    }

    /// The catalog, bootstrapping it on first call
    pub fn catalog(&self) -> Result<&Catalog> {
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }

        let mut txn = self.session.txn.lock();
        if let Some(catalog) = self.catalog.get() {
            return Ok(catalog);
        }
        let catalog = Catalog::bootstrap(&self.session, &mut txn)?;
        Ok(self.catalog.get_or_init(|| catalog))
    }

    /// Open (or create and register) the table `name`
    ///
    /// On a catalog hit the stored locator and schema are used and nothing
    /// is created.
    pub fn open_table(&self, name: &QualifiedTableName, schema: Schema) -> Result<TableHandle> {
        schema.validate()?;
        let catalog = self.catalog()?;
        let name = self.qualify(name);

        let mut txn = self.session.txn.lock();
        catalog.open_table(&mut txn, name, schema)
    }

    fn qualify(&self, name: &QualifiedTableName) -> QualifiedTableName {
        match &self.config.scope_prefix {
            Some(prefix) if !name.is_catalog() => name.with_prefix(prefix),
            _ => name.clone(),
        }
    }

    /// Every registered table, the catalog's own entry included
    pub fn tables(&self) -> Result<Vec<CatalogEntry>> {
        self.catalog()?.entries()
    }

    /// Commit pending writes and begin a fresh transaction.
    /// Returns false (and does nothing) if nothing was written.
    pub fn commit(&self) -> Result<bool> {
        let mut txn = self.session.txn.lock();
        txn.commit(self.session.substrate.as_ref())
    }

    /// Abort pending writes and begin a fresh transaction
    ///
    /// If the aborted transaction had created the catalog, it is created
    /// again at the root so the cached catalog stays valid. Handles to other
    /// tables created in the aborted transaction become dangling; reopen
    /// them by name.
    pub fn abort(&self) -> Result<()> {
        let mut txn = self.session.txn.lock();
        let substrate = self.session.substrate.as_ref();
        txn.abort(substrate)?;

        if self.catalog.get().is_some()
            && substrate.record_type(txn.xid(), substrate.root_record())? == RecordType::Uninitialized
        {
            Catalog::bootstrap(&self.session, &mut txn)?;
            info!("catalog bootstrap rolled back by abort; bootstrapped again");
        }
        Ok(())
    }

    /// Ask the substrate to checkpoint; false if it could not right now
    pub fn checkpoint(&self) -> Result<bool> {
        self.session.substrate.checkpoint()
    }

    /// Close the store gracefully
    ///
    /// Commits pending writes, checkpoints and syncs.
    pub fn close(self) -> Result<()> {
        self.commit()?;
        self.session.substrate.checkpoint()?;
        self.session.substrate.sync()?;
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Current session transaction
    pub fn transaction_id(&self) -> TransactionId {
        self.session.txn.xid()
    }

    /// Whether the session transaction has uncommitted writes
    pub fn is_dirty(&self) -> bool {
        self.session.txn.is_dirty()
    }

    /// Number of table cursors dropped before being drained
    pub fn leaked_cursor_count(&self) -> u64 {
        self.session.leaked_cursors.load(Ordering::Relaxed)
    }
}
