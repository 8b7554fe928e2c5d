use ethereum_types::H256;
use mpt_rlp::encode::RLPEncode;

use crate::{
    error::TrieError, InMemoryTrieDB, NodeRLP, Trie, TrieDB, TrieOptions, ValueRLP,
    EMPTY_TRIE_HASH,
};

impl Trie {
    /// Obtain a merkle proof for the given key: the serialized nodes traversed
    /// from the root towards the key, root first. The proof is still
    /// constructed when the key is absent, proving the absence along that path.
    pub fn get_proof(&self, key: &[u8]) -> Result<Vec<NodeRLP>, TrieError> {
        if self.hash()? == *EMPTY_TRIE_HASH {
            return Ok(Vec::new());
        }
        let found = self.find_path(key)?;
        Ok(found
            .stack
            .iter()
            .map(|(_, node)| node.encode_to_vec())
            .collect())
    }

    /// Verify a proof under this trie's configuration (hash function and
    /// secure-key mode), without touching its store.
    pub fn verify_proof(
        &self,
        root: H256,
        key: &[u8],
        proof: &[NodeRLP],
    ) -> Result<Option<ValueRLP>, TrieError> {
        verify_proof_with_options(
            root,
            key,
            proof,
            TrieOptions {
                hash_fn: self.hash_fn,
                hash_keys: self.hash_keys,
                ..Default::default()
            },
        )
    }
}

/// Verify a merkle proof against `root`: reconstructs an ephemeral trie over
/// the proof nodes and reads `key` through it. A returned value authenticates
/// presence; `None` authenticates absence; a node missing along the path
/// invalidates the proof.
pub fn verify_proof(
    root: H256,
    key: &[u8],
    proof: &[NodeRLP],
) -> Result<Option<ValueRLP>, TrieError> {
    verify_proof_with_options(root, key, proof, TrieOptions::default())
}

pub fn verify_proof_with_options(
    root: H256,
    key: &[u8],
    proof: &[NodeRLP],
    options: TrieOptions,
) -> Result<Option<ValueRLP>, TrieError> {
    let db = InMemoryTrieDB::default();
    let hash_fn = options.hash_fn;
    for node in proof {
        if node.is_empty() {
            continue;
        }
        db.put(hash_fn(node).as_bytes().to_vec(), node.clone())?;
    }

    let trie = Trie::with_options(
        Box::new(db),
        TrieOptions {
            root: Some(root.as_bytes().to_vec()),
            ..options
        },
    )?;
    match trie.get(key) {
        Err(TrieError::MissingNode(hash)) => Err(TrieError::InvalidProof(format!(
            "node {hash:#x} is not part of the proof"
        ))),
        other => other,
    }
}
