//! Error types for TabulaKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::substrate::RecordLocator;

/// Result type alias using TabulaError
pub type Result<T> = std::result::Result<T, TabulaError>;

/// Unified error type for TabulaKV operations
#[derive(Debug, Error)]
pub enum TabulaError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    /// Opaque substrate failure, propagated unchanged to the caller
    #[error("Storage operation failed: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Consistency Violations (fatal, never retried)
    // -------------------------------------------------------------------------
    #[error("Bootstrapping did not place the catalog at the root record: expected {expected}, got {actual}")]
    BootstrapMismatch {
        expected: RecordLocator,
        actual: RecordLocator,
    },

    #[error("Store in an inconsistent state: {0}")]
    InconsistentStore(String),

    // -------------------------------------------------------------------------
    // Programming Faults
    // -------------------------------------------------------------------------
    #[error("Key bytes must not be empty")]
    EmptyKey,

    #[error("Table handle is not initialized")]
    UninitializedHandle,

    #[error("Cursor pulled after end of iteration")]
    CursorExhausted,

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("Row does not match table schema: {0}")]
    SchemaMismatch(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TabulaError {
    /// True for store corruption or defects that must abort the enclosing
    /// operation and must not be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TabulaError::BootstrapMismatch { .. } | TabulaError::InconsistentStore(_)
        )
    }
}

impl From<bincode::Error> for TabulaError {
    fn from(e: bincode::Error) -> Self {
        TabulaError::Serialization(e.to_string())
    }
}
