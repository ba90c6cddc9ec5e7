//! Configuration for TabulaKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{Result, TabulaError};

/// Main configuration for a TabulaKV store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal.log          (write-ahead log)
    ///     └── checkpoint.dat   (last checkpoint of all hash structures)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// WAL size (in bytes) past which a commit triggers a checkpoint
    pub checkpoint_threshold_bytes: u64,

    // -------------------------------------------------------------------------
    // Catalog Configuration
    // -------------------------------------------------------------------------
    /// Prefix rewritten onto every table scope, e.g. a listening port.
    /// Lets independent logical stores share one data directory.
    pub scope_prefix: Option<String>,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N unsynced entries; commit markers always sync
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./tabulakv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            checkpoint_threshold_bytes: 16 * 1024 * 1024, // 16 MB
            scope_prefix: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.checkpoint_threshold_bytes == 0 {
            return Err(TabulaError::Config(
                "checkpoint_threshold_bytes must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(TabulaError::Config(
                "EveryNEntries sync count must be greater than zero".to_string(),
            ));
        }
        if matches!(self.scope_prefix.as_deref(), Some("")) {
            return Err(TabulaError::Config("scope_prefix must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the WAL size (in bytes) that triggers a checkpoint
    pub fn checkpoint_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.checkpoint_threshold_bytes = bytes;
        self
    }

    /// Set the scope prefix (e.g. a listening port)
    pub fn scope_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.scope_prefix = Some(prefix.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
