//! Table Module
//!
//! Named, schema-tagged tables over substrate hash structures.
//!
//! ## Responsibilities
//! - Catalog bootstrap and table registration
//! - Per-table CRUD over raw key/value byte pairs
//! - Lookahead cursors for full scans
//! - Typed rows on top of the raw operations (key projection + codec)

mod catalog;
mod codec;
mod cursor;
mod handle;
mod name;
mod schema;

pub use catalog::{Catalog, CatalogEntry};
pub use codec::{decode_row, encode_row};
pub use cursor::{RowCursor, TableCursor};
pub use handle::TableHandle;
pub use name::QualifiedTableName;
pub use schema::{KeySpec, Row, Schema, TypeTag, Value};
