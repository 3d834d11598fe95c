//! Hash-based in-memory index.

use std::collections::HashMap;

use parking_lot::RwLock;

use super::IndexAccess;
use super::error::IndexError;
use crate::datum::Value;
use crate::tableam::TupleId;

/// An in-memory hash index: key bytes to TIDs.
///
/// Keys are encoded with a type tag per column so values of different types
/// never collide.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    entries: RwLock<HashMap<Vec<u8>, Vec<TupleId>>>,
    key_len: Option<usize>,
}

impl MemoryIndex {
    /// Creates an empty index that accepts keys of any width.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty index whose keys must have `key_len` columns.
    pub fn with_key_len(key_len: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            key_len: Some(key_len),
        }
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().values().map(Vec::len).sum()
    }

    /// Returns true if the index has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_len(&self, key: &[Value]) -> Result<(), IndexError> {
        match self.key_len {
            Some(expected) if expected != key.len() => Err(IndexError::KeyLength {
                expected,
                actual: key.len(),
            }),
            _ => Ok(()),
        }
    }
}

fn encode_key(key: &[Value]) -> Result<Vec<u8>, IndexError> {
    let mut buf = Vec::new();
    for value in key {
        let tag = match value.data_type() {
            Some(ty) => ty as u8,
            None => u8::MAX,
        };
        buf.push(tag);
        let start = buf.len();
        buf.resize(start + value.serialized_size(), 0);
        value.serialize(&mut buf[start..])?;
    }
    Ok(buf)
}

impl IndexAccess for MemoryIndex {
    fn insert(&self, key: Vec<Value>, tid: TupleId) -> Result<(), IndexError> {
        self.check_len(&key)?;
        let encoded = encode_key(&key)?;
        self.entries.write().entry(encoded).or_default().push(tid);
        Ok(())
    }

    fn equality_scan(&self, key: &[Value]) -> Result<Vec<TupleId>, IndexError> {
        self.check_len(key)?;
        if key.iter().any(Value::is_null) {
            return Ok(Vec::new());
        }
        let encoded = encode_key(key)?;
        Ok(self.entries.read().get(&encoded).cloned().unwrap_or_default())
    }
}
