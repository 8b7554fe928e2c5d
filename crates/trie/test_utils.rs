use ethereum_types::H256;

use crate::{PathRLP, Trie, ValueRLP};

/// Builds a fresh in-memory trie holding the given pairs and returns its root
pub fn expect_root(pairs: &[(PathRLP, ValueRLP)]) -> H256 {
    let trie = Trie::new_temp();
    for (path, value) in pairs {
        trie.insert(path.clone(), value.clone()).unwrap();
    }
    trie.hash().unwrap()
}

/// Parses a fixture root hash from its hex form
pub fn h(hex_str: &str) -> H256 {
    H256::from_slice(&hex::decode(hex_str).unwrap())
}
