//! # TabulaKV
//!
//! Persistent, transactional key/value tables with:
//! - A self-describing catalog rooted at a well-known record
//! - Named tables that reopen by name across restarts
//! - Change-detecting upserts and conditional (compare-and-remove) deletes
//! - Lookahead cursors for full scans
//! - Write-Ahead Logging (WAL) and checkpoints underneath
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Store                               │
//! │        (session transaction context + catalog once)          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │   Catalog   │─────────▶│ TableHandle │──▶ TableCursor
//!   │ (root rec.) │  opens   │  (locator)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!               ┌───────────────┐
//!               │   Substrate   │
//!               │ (hash + txns) │
//!               └───────┬───────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │ Checkpoint  │
//!   │  (Append)   │          │   (Image)   │
//!   └─────────────┘          └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod storage;
pub mod store;
pub mod substrate;
pub mod table;
pub mod txn;
pub mod wal;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use error::{Result, TabulaError};
pub use store::Store;
pub use substrate::{FileSubstrate, RecordLocator, Substrate, TransactionId};
pub use table::{KeySpec, QualifiedTableName, Schema, TableCursor, TableHandle, TypeTag, Value};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of TabulaKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
