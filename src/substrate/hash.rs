//! In-memory hash structure
//!
//! The live contents of one structure. Durability comes from the WAL and
//! checkpoints in [`super::FileSubstrate`]; this type only holds rows.

use std::collections::HashMap;

use bytes::Bytes;

/// Rows of one hash structure
#[derive(Debug, Default, Clone)]
pub struct HashStructure {
    entries: HashMap<Bytes, Bytes>,
}

impl HashStructure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert, returning the previous value
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Option<Bytes> {
        self.entries
            .insert(Bytes::copy_from_slice(key), Bytes::copy_from_slice(value))
    }

    /// Restore a value captured earlier (undo / replay path)
    pub fn restore(&mut self, key: Bytes, value: Option<Bytes>) {
        match value {
            Some(v) => {
                self.entries.insert(key, v);
            }
            None => {
                self.entries.remove(&key);
            }
        }
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<Bytes> {
        self.entries.remove(key)
    }

    pub fn get(&self, key: &[u8]) -> Option<&Bytes> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of every pair. Clones share the underlying buffers.
    pub fn snapshot(&self) -> Vec<(Bytes, Bytes)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.entries.iter()
    }
}
