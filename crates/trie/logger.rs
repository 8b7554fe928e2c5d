use std::{
    collections::HashSet,
    sync::{Arc, Mutex, RwLock},
};

use crate::{
    db::{BatchOp, TrieDB},
    error::TrieError,
    Trie,
};

/// Set of node bodies read while executing over a logged trie.
pub type TrieWitness = Arc<Mutex<HashSet<Vec<u8>>>>;

/// Store wrapper recording every node body read through it.
pub struct TrieLogger {
    inner_db: Box<dyn TrieDB>,
    witness: TrieWitness,
}

impl TrieLogger {
    pub fn get_witness(&self) -> Result<HashSet<Vec<u8>>, TrieError> {
        let lock = self.witness.lock().map_err(|_| TrieError::LockError)?;
        Ok(lock.clone())
    }

    /// Rewraps a trie so every node read from its store gets recorded into
    /// the returned witness.
    pub fn open_trie(trie: Trie) -> (TrieWitness, Trie) {
        let Trie {
            db,
            root,
            write_gate: _,
            hash_fn,
            hash_keys,
            delete_on_write,
            persist_root,
        } = trie;
        let root = root.into_inner().unwrap_or_else(|poison| poison.into_inner());

        let witness: TrieWitness = Arc::new(Mutex::new(HashSet::new()));
        let logger = TrieLogger {
            inner_db: db,
            witness: witness.clone(),
        };

        (
            witness,
            Trie {
                db: Box::new(logger),
                root: RwLock::new(root),
                write_gate: Mutex::new(()),
                hash_fn,
                hash_keys,
                delete_on_write,
                persist_root,
            },
        )
    }
}

impl TrieDB for TrieLogger {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, TrieError> {
        let result = self.inner_db.get(key)?;
        if let Some(result) = result.as_ref() {
            let mut lock = self.witness.lock().map_err(|_| TrieError::LockError)?;
            lock.insert(result.clone());
        }
        Ok(result)
    }

    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), TrieError> {
        self.inner_db.put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<(), TrieError> {
        self.inner_db.delete(key)
    }

    fn put_batch(&self, ops: Vec<BatchOp>) -> Result<(), TrieError> {
        self.inner_db.put_batch(ops)
    }

    fn copy(&self) -> Box<dyn TrieDB> {
        Box::new(TrieLogger {
            inner_db: self.inner_db.copy(),
            witness: self.witness.clone(),
        })
    }
}
