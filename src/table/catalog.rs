//! Catalog
//!
//! The table of tables. It lives in the hash structure at the substrate's
//! root record and maps each qualified table name to the locator and schema
//! of that table's structure. The catalog describes itself with one of its
//! own rows, so reopening it and reopening any other table read the same way.
//!
//! ## Catalog row
//! ```text
//! [Text scope, Text name | UInt64 major, UInt64 minor, List key_columns, List column_types]
//!  └──────── key ───────┘  └──────────────────────── value ─────────────────────────────┘
//! ```

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::error::{Result, TabulaError};
use crate::store::Session;
use crate::substrate::{RecordLocator, RecordType};
use crate::txn::TxnState;

use super::codec::{decode_row, encode_row};
use super::cursor::TableCursor;
use super::handle::TableHandle;
use super::name::QualifiedTableName;
use super::schema::{KeySpec, Schema, TypeTag, Value};

/// One registered table
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: QualifiedTableName,
    pub locator: RecordLocator,
    pub schema: Schema,
}

impl CatalogEntry {
    /// Schema of the catalog's own rows
    pub fn catalog_schema() -> Schema {
        Schema::new(
            KeySpec::new([0, 1]),
            [
                TypeTag::Text,
                TypeTag::Text,
                TypeTag::UInt64,
                TypeTag::UInt64,
                TypeTag::List,
                TypeTag::List,
            ],
        )
    }

    /// Encoded catalog key for `name`
    pub fn key_bytes(name: &QualifiedTableName) -> Result<Vec<u8>> {
        encode_row(&[
            Value::Text(name.scope.clone()),
            Value::Text(name.name.clone()),
        ])
    }

    pub fn to_row(&self) -> Vec<Value> {
        vec![
            Value::Text(self.name.scope.clone()),
            Value::Text(self.name.name.clone()),
            Value::UInt64(self.locator.major),
            Value::UInt64(self.locator.minor),
            Value::List(
                self.schema
                    .key
                    .columns()
                    .iter()
                    .map(|&c| Value::UInt64(c as u64))
                    .collect(),
            ),
            Value::List(
                self.schema
                    .column_types
                    .iter()
                    .map(|t| Value::Text(t.as_str().to_string()))
                    .collect(),
            ),
        ]
    }

    /// Decode a stored catalog pair
    ///
    /// Any shape other than the catalog row layout, or a null locator, means
    /// the store is corrupt and yields [`TabulaError::InconsistentStore`].
    pub fn from_pair(key: &[u8], value: &[u8]) -> Result<Self> {
        let key_row = decode_row(key)
            .map_err(|e| inconsistent(format!("undecodable catalog key: {}", e)))?;
        let name = match key_row.as_slice() {
            [Value::Text(scope), Value::Text(name)] => QualifiedTableName::new(scope, name),
            other => return Err(inconsistent(format!("unexpected catalog key shape: {:?}", other))),
        };

        let value_row = decode_row(value)
            .map_err(|e| inconsistent(format!("undecodable catalog entry for {}: {}", name, e)))?;
        let (major, minor, columns, types) = match value_row.as_slice() {
            [Value::UInt64(major), Value::UInt64(minor), Value::List(columns), Value::List(types)] => {
                (*major, *minor, columns, types)
            }
            other => {
                return Err(inconsistent(format!(
                    "unexpected catalog entry shape for {}: {:?}",
                    name, other
                )))
            }
        };

        let columns = columns
            .iter()
            .map(|c| match c {
                Value::UInt64(c) => Ok(*c as usize),
                other => Err(inconsistent(format!("bad key column {:?} for {}", other, name))),
            })
            .collect::<Result<Vec<_>>>()?;
        let column_types = types
            .iter()
            .map(|t| match t {
                Value::Text(t) => t
                    .parse::<TypeTag>()
                    .map_err(|_| inconsistent(format!("bad type tag {:?} for {}", t, name))),
                other => Err(inconsistent(format!("bad type tag {:?} for {}", other, name))),
            })
            .collect::<Result<Vec<_>>>()?;

        let schema = Schema::new(KeySpec::new(columns), column_types);
        schema
            .validate()
            .map_err(|e| inconsistent(format!("invalid stored schema for {}: {}", name, e)))?;

        let locator = RecordLocator::new(major, minor);
        if locator.is_null() {
            return Err(inconsistent(format!("null locator stored for {}", name)));
        }

        Ok(Self {
            name,
            locator,
            schema,
        })
    }
}

fn inconsistent(reason: String) -> TabulaError {
    error!(%reason, "catalog inconsistency");
    TabulaError::InconsistentStore(reason)
}

/// The bootstrapped catalog table
pub struct Catalog {
    table: TableHandle,
}

impl Catalog {
    /// Locate or create the root structure and register the catalog in itself
    ///
    /// Called with the session's transaction lock held.
    pub(crate) fn bootstrap(session: &Arc<Session>, txn: &mut TxnState) -> Result<Self> {
        let substrate = &session.substrate;
        let root = substrate.root_record();

        let locator = match substrate.record_type(txn.xid(), root)? {
            RecordType::Uninitialized => {
                txn.mark_dirty();
                let created = substrate.create_hash(txn.xid())?;
                if created != root {
                    error!(expected = %root, actual = %created, "catalog bootstrap missed the root record");
                    return Err(TabulaError::BootstrapMismatch {
                        expected: root,
                        actual: created,
                    });
                }
                info!(locator = %created, "bootstrapped catalog in uninitialized store");
                created
            }
            RecordType::HashStructure => {
                debug!(locator = %root, "reopened existing catalog");
                root
            }
        };

        let catalog = Self {
            table: TableHandle::new(
                Arc::clone(session),
                QualifiedTableName::catalog(),
                locator,
                CatalogEntry::catalog_schema(),
            ),
        };
        catalog.register(
            txn,
            &CatalogEntry {
                name: QualifiedTableName::catalog(),
                locator,
                schema: CatalogEntry::catalog_schema(),
            },
        )?;
        Ok(catalog)
    }

    fn register(&self, txn: &mut TxnState, entry: &CatalogEntry) -> Result<()> {
        let row = entry.to_row();
        let key = encode_row(&self.table.schema().key.project_key(&row)?)?;
        let value = encode_row(&self.table.schema().key.project_value(&row)?)?;
        self.table.put_locked(txn, &key, &value)?;
        Ok(())
    }

    /// Resolve `name` to a table, creating and registering it on a miss
    ///
    /// Called with the session's transaction lock held, so the
    /// create-or-lookup decision is atomic.
    pub(crate) fn open_table(
        &self,
        txn: &mut TxnState,
        name: QualifiedTableName,
        schema: Schema,
    ) -> Result<TableHandle> {
        let key = CatalogEntry::key_bytes(&name)?;

        let entry = match self.table.get(&key)? {
            None => {
                txn.mark_dirty();
                let locator = self.table_session().substrate.create_hash(txn.xid())?;
                let entry = CatalogEntry {
                    name,
                    locator,
                    schema,
                };
                self.register(txn, &entry)?;
                debug!(table = %entry.name, locator = %locator, "created table");
                entry
            }
            Some(value) => {
                let entry = CatalogEntry::from_pair(&key, &value)?;
                if entry.name != name {
                    return Err(inconsistent(format!(
                        "catalog lookup for {} returned entry for {}",
                        name, entry.name
                    )));
                }
                let record_type = self
                    .table_session()
                    .substrate
                    .record_type(txn.xid(), entry.locator)?;
                if record_type != RecordType::HashStructure {
                    return Err(inconsistent(format!(
                        "catalog entry for {} points at {:?} record {}",
                        entry.name, record_type, entry.locator
                    )));
                }
                if entry.schema != schema {
                    warn!(
                        table = %entry.name,
                        "reopened with a different schema; keeping the stored one"
                    );
                }
                entry
            }
        };

        Ok(TableHandle::new(
            Arc::clone(self.table_session()),
            entry.name,
            entry.locator,
            entry.schema,
        ))
    }

    fn table_session(&self) -> &Arc<Session> {
        self.table.session()
    }

    /// The catalog viewed as an ordinary table
    pub(crate) fn table(&self) -> &TableHandle {
        &self.table
    }

    pub fn locator(&self) -> RecordLocator {
        self.table.locator()
    }

    /// Every registered table, the catalog included
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let cursor: TableCursor = self.table.scan()?;
        let mut entries = Vec::new();
        for pair in cursor {
            let (key, value) = pair?;
            entries.push(CatalogEntry::from_pair(&key, &value)?);
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }
}
