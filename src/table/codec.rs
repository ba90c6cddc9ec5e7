//! Row codec
//!
//! Typed rows to and from the raw byte strings tables store.

use crate::error::Result;

use super::schema::{Row, Value};

/// Encode a row (or a key/value projection of one)
pub fn encode_row(row: &[Value]) -> Result<Vec<u8>> {
    Ok(bincode::serialize(row)?)
}

/// Decode bytes produced by [`encode_row`]
pub fn decode_row(bytes: &[u8]) -> Result<Row> {
    Ok(bincode::deserialize(bytes)?)
}
