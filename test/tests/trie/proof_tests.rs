use mpt_trie::{keccak256, verify_proof, InMemoryTrieDB, Trie, TrieError, TrieOptions};
use proptest::collection::{btree_map, vec};
use proptest::prelude::any;
use proptest::proptest;

#[test]
fn proof_of_absence_on_a_shared_prefix_trie() {
    let trie = Trie::new_temp();
    trie.insert(b"do".to_vec(), b"verb".to_vec()).unwrap();
    trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
    let root = trie.hash().unwrap();

    let proof = trie.get_proof(b"cat").unwrap();
    assert!(!proof.is_empty());
    assert_eq!(verify_proof(root, b"cat", &proof).unwrap(), None);
}

#[test]
fn proofs_are_root_first() {
    let trie = Trie::new_temp();
    for i in 0u8..64 {
        trie.insert(vec![i; 4], vec![i; 40]).unwrap();
    }
    let root = trie.hash().unwrap();

    let proof = trie.get_proof(&[9; 4]).unwrap();
    assert_eq!(keccak256(&proof[0]), root);
}

#[test]
fn proof_against_the_wrong_root_is_invalid() {
    let trie = Trie::new_temp();
    for i in 0u8..64 {
        trie.insert(vec![i; 4], vec![i; 40]).unwrap();
    }
    let proof = trie.get_proof(&[9; 4]).unwrap();

    let other_root = keccak256(b"some other trie");
    assert!(matches!(
        verify_proof(other_root, &[9; 4], &proof),
        Err(TrieError::InvalidProof(_))
    ));
}

#[test]
fn tampered_proof_is_invalid() {
    let trie = Trie::new_temp();
    for i in 0u8..64 {
        trie.insert(vec![i; 4], vec![i; 40]).unwrap();
    }
    let root = trie.hash().unwrap();

    let mut proof = trie.get_proof(&[9; 4]).unwrap();
    assert!(proof.len() > 1);
    // corrupt a non-root node: its hash no longer matches the parent ref
    let last = proof.len() - 1;
    proof[last][0] ^= 0x01;
    assert!(matches!(
        verify_proof(root, &[9; 4], &proof),
        Err(TrieError::InvalidProof(_))
    ));
}

#[test]
fn secure_trie_proofs_verify_under_the_same_options() {
    let trie = Trie::with_options(
        Box::new(InMemoryTrieDB::default()),
        TrieOptions {
            hash_keys: true,
            ..Default::default()
        },
    )
    .unwrap();
    trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
    trie.insert(b"horse".to_vec(), b"stallion".to_vec()).unwrap();
    let root = trie.hash().unwrap();

    let proof = trie.get_proof(b"dog").unwrap();
    assert_eq!(
        trie.verify_proof(root, b"dog", &proof).unwrap(),
        Some(b"puppy".to_vec())
    );
}

proptest! {
    #[test]
    fn proptest_proof_soundness(data in btree_map(vec(any::<u8>(), 4..32), vec(any::<u8>(), 1..64), 1..64), absent in vec(any::<u8>(), 1..3)) {
        let trie = Trie::new_temp();
        for (path, value) in data.clone() {
            trie.insert(path, value).unwrap();
        }
        let root = trie.hash().unwrap();

        // verification reproduces get() for every present key
        for (path, value) in data {
            let proof = trie.get_proof(&path).unwrap();
            assert_eq!(verify_proof(root, &path, &proof).unwrap(), Some(value));
        }

        // and for a key that cannot be present (too short for the keyspace)
        let proof = trie.get_proof(&absent).unwrap();
        assert_eq!(verify_proof(root, &absent, &proof).unwrap(), None);
    }
}
