//! Typed rows, key specifications and table schemas

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TabulaError};

/// Column type signature element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Bool,
    Int64,
    UInt64,
    Float64,
    Text,
    Bytes,
    List,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Bool => "bool",
            TypeTag::Int64 => "int64",
            TypeTag::UInt64 => "uint64",
            TypeTag::Float64 => "float64",
            TypeTag::Text => "text",
            TypeTag::Bytes => "bytes",
            TypeTag::List => "list",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TypeTag {
    type Err = TabulaError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bool" => Ok(TypeTag::Bool),
            "int64" => Ok(TypeTag::Int64),
            "uint64" => Ok(TypeTag::UInt64),
            "float64" => Ok(TypeTag::Float64),
            "text" => Ok(TypeTag::Text),
            "bytes" => Ok(TypeTag::Bytes),
            "list" => Ok(TypeTag::List),
            other => Err(TabulaError::SchemaMismatch(format!("unknown type tag {:?}", other))),
        }
    }
}

/// A single column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Bool(bool),
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    List(Vec<Value>),
}

impl Value {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            Value::Bool(_) => TypeTag::Bool,
            Value::Int64(_) => TypeTag::Int64,
            Value::UInt64(_) => TypeTag::UInt64,
            Value::Float64(_) => TypeTag::Float64,
            Value::Text(_) => TypeTag::Text,
            Value::Bytes(_) => TypeTag::Bytes,
            Value::List(_) => TypeTag::List,
        }
    }
}

/// A full row: one value per column
pub type Row = Vec<Value>;

/// Which columns form a row's primary key
///
/// An empty column list makes the whole row the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeySpec {
    columns: Vec<usize>,
}

impl KeySpec {
    pub fn new(columns: impl Into<Vec<usize>>) -> Self {
        Self {
            columns: columns.into(),
        }
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Columns must be distinct and inside a row of `arity` columns
    pub fn validate(&self, arity: usize) -> Result<()> {
        for (i, &col) in self.columns.iter().enumerate() {
            if col >= arity {
                return Err(TabulaError::SchemaMismatch(format!(
                    "key column {} out of range for {} columns",
                    col, arity
                )));
            }
            if self.columns[..i].contains(&col) {
                return Err(TabulaError::SchemaMismatch(format!("key column {} repeated", col)));
            }
        }
        Ok(())
    }

    fn positions(&self, arity: usize) -> Vec<usize> {
        if self.columns.is_empty() {
            (0..arity).collect()
        } else {
            self.columns.clone()
        }
    }

    fn is_key_column(&self, col: usize) -> bool {
        self.columns.is_empty() || self.columns.contains(&col)
    }

    /// Key columns of `row`, in key order
    pub fn project_key(&self, row: &[Value]) -> Result<Row> {
        self.validate(row.len())?;
        Ok(self
            .positions(row.len())
            .into_iter()
            .map(|col| row[col].clone())
            .collect())
    }

    /// Non-key columns of `row`, in column order
    pub fn project_value(&self, row: &[Value]) -> Result<Row> {
        self.validate(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .filter(|(col, _)| !self.is_key_column(*col))
            .map(|(_, v)| v.clone())
            .collect())
    }

    /// Inverse of the two projections
    pub fn reconstruct(&self, key: Row, value: Row) -> Result<Row> {
        let arity = key.len() + value.len();
        self.validate(arity)?;
        let positions = self.positions(arity);
        if positions.len() != key.len() {
            return Err(TabulaError::SchemaMismatch(format!(
                "key has {} columns, key spec names {}",
                key.len(),
                positions.len()
            )));
        }

        let mut slots: Vec<Option<Value>> = vec![None; arity];
        for (col, v) in positions.into_iter().zip(key) {
            slots[col] = Some(v);
        }
        let mut rest = value.into_iter();
        for slot in slots.iter_mut().filter(|s| s.is_none()) {
            *slot = rest.next();
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(col, v)| {
                v.ok_or_else(|| TabulaError::SchemaMismatch(format!("column {} missing", col)))
            })
            .collect()
    }
}

/// Key specification plus column type signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub key: KeySpec,
    pub column_types: Vec<TypeTag>,
}

impl Schema {
    pub fn new(key: KeySpec, column_types: impl Into<Vec<TypeTag>>) -> Self {
        Self {
            key,
            column_types: column_types.into(),
        }
    }

    pub fn arity(&self) -> usize {
        self.column_types.len()
    }

    pub fn validate(&self) -> Result<()> {
        self.key.validate(self.arity())
    }

    /// Arity and per-column type check
    pub fn check(&self, row: &[Value]) -> Result<()> {
        if row.len() != self.arity() {
            return Err(TabulaError::SchemaMismatch(format!(
                "row has {} columns, schema has {}",
                row.len(),
                self.arity()
            )));
        }
        for (col, (value, tag)) in row.iter().zip(&self.column_types).enumerate() {
            if value.type_tag() != *tag {
                return Err(TabulaError::SchemaMismatch(format!(
                    "column {} is {}, expected {}",
                    col,
                    value.type_tag(),
                    tag
                )));
            }
        }
        Ok(())
    }
}
