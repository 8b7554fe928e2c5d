use crate::error::TrieError;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// A single operation inside an atomic store batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Byte-addressable KV store backing a trie. Keys are node hashes (plus the
/// optional reserved root key); values are canonical node RLP.
///
/// `put_batch` must apply the whole list atomically: success implies every
/// operation was applied, in order. Implementations must reject a `Put` with
/// an empty value with [`TrieError::InvalidBatchOp`], since an empty body is
/// indistinguishable from an absent node.
pub trait TrieDB: Send + Sync {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError>;
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError>;
    fn delete(&self, key: &[u8]) -> Result<(), TrieError>;
    fn put_batch(&self, ops: Vec<BatchOp>) -> Result<(), TrieError>;
    /// Returns a new handle over the same underlying data. Whether the handle
    /// aliases or snapshots the data is up to the store; the trie does not
    /// distinguish.
    fn copy(&self) -> Box<dyn TrieDB>;
}

/// InMemory implementation for the TrieDB trait, with get and put operations.
pub struct InMemoryTrieDB {
    inner: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryTrieDB {
    pub fn new(map: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>) -> Self {
        Self { inner: map }
    }
}

impl Default for InMemoryTrieDB {
    fn default() -> Self {
        Self::new(Default::default())
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .get(key)
            .cloned())
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .insert(key, value);
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), TrieError> {
        self.inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .remove(key);
        Ok(())
    }

    fn put_batch(&self, ops: Vec<BatchOp>) -> Result<(), TrieError> {
        if ops
            .iter()
            .any(|op| matches!(op, BatchOp::Put { value, .. } if value.is_empty()))
        {
            return Err(TrieError::InvalidBatchOp);
        }

        // Holding the map lock across the loop makes the batch atomic with
        // respect to every other operation on this handle.
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;

        for op in ops {
            match op {
                BatchOp::Put { key, value } => {
                    db.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    db.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn copy(&self) -> Box<dyn TrieDB> {
        Box::new(Self {
            inner: self.inner.clone(),
        })
    }
}
