use ethereum_types::H256;
use mpt_trie::{
    keccak256, InMemoryTrieDB, Node, Trie, TrieDB, TrieError, TrieLogger, TrieOptions,
    EMPTY_TRIE_HASH, ROOT_DB_KEY,
};
use proptest::collection::{btree_map, vec};
use proptest::prelude::any;
use proptest::proptest;

fn build(pairs: &[(&[u8], &[u8])]) -> Trie {
    let trie = Trie::new_temp();
    for (path, value) in pairs {
        trie.insert(path.to_vec(), value.to_vec()).unwrap();
    }
    trie
}

#[test]
fn compute_hash() {
    let trie = build(&[(b"first", b"value"), (b"second", b"value")]);
    assert_eq!(
        trie.hash().unwrap(),
        H256::from_slice(
            &hex::decode("f7537e7f4b313c426440b7fface6bff76f51b3eb0d127356efbe6f2b3c891501")
                .unwrap()
        ),
    );
}

#[test]
fn compute_hash_long() {
    let trie = build(&[
        (b"first", b"value"),
        (b"second", b"value"),
        (b"third", b"value"),
        (b"fourth", b"value"),
    ]);
    assert_eq!(
        trie.hash().unwrap(),
        H256::from_slice(
            &hex::decode("e2ff76eca34a96b68e6871c74f2a5d9db58e59f82073276866fdd25e560cedea")
                .unwrap()
        ),
    );
}

#[test]
fn get_insert_words() {
    let trie = build(&[(b"first", b"value"), (b"second", b"value")]);
    let first = trie.get(b"first").unwrap();
    assert!(first.is_some());
    let second = trie.get(b"second").unwrap();
    assert!(second.is_some());
}

#[test]
fn get_insert_zero() {
    let trie = Trie::new_temp();
    trie.insert(vec![0x0], b"value".to_vec()).unwrap();
    let first = trie.get(&[0x0]).unwrap();
    assert_eq!(first, Some(b"value".to_vec()));
}

#[test]
fn get_inserted_many() {
    let pairs: Vec<(Vec<u8>, Vec<u8>)> = (0u16..500)
        .map(|i| {
            (
                keccak256(&i.to_be_bytes()).as_bytes().to_vec(),
                i.to_be_bytes().to_vec(),
            )
        })
        .collect();
    let trie = Trie::new_temp();
    for (path, value) in &pairs {
        trie.insert(path.clone(), value.clone()).unwrap();
    }
    for (path, value) in &pairs {
        assert_eq!(trie.get(path).unwrap().as_ref(), Some(value));
    }
    trie.validate().unwrap();
}

#[test]
fn mixed_inserts_and_removals_match_rebuilt_trie() {
    let trie = Trie::new_temp();
    let keys: Vec<Vec<u8>> = (0u8..100).map(|i| vec![i % 16, i / 3, i]).collect();
    for key in &keys {
        trie.insert(key.clone(), key.clone()).unwrap();
    }
    for key in keys.iter().step_by(3) {
        trie.remove(key).unwrap();
    }

    let survivors: Vec<(Vec<u8>, Vec<u8>)> = keys
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 3 != 0)
        .map(|(_, k)| (k.clone(), k.clone()))
        .collect();
    let rebuilt = Trie::new_temp();
    for (path, value) in survivors {
        rebuilt.insert(path, value).unwrap();
    }
    assert_eq!(trie.hash().unwrap(), rebuilt.hash().unwrap());
    trie.validate().unwrap();
}

#[test]
fn secure_trie_round_trips_and_bounds_path_depth() {
    let trie = Trie::with_options(
        Box::new(InMemoryTrieDB::default()),
        TrieOptions {
            hash_keys: true,
            ..Default::default()
        },
    )
    .unwrap();

    // key lengths vary wildly, routing paths stay at 64 nibbles
    let keys: Vec<Vec<u8>> = vec![
        b"a".to_vec(),
        b"some-very-long-key-some-very-long-key-some-very-long-key".to_vec(),
        vec![0xff; 100],
    ];
    for key in &keys {
        trie.insert(key.clone(), key.clone()).unwrap();
    }
    for key in &keys {
        assert_eq!(trie.get(key).unwrap().as_ref(), Some(key));
    }
    for (path, node) in trie.into_iter() {
        if let Node::Leaf(_) = node {
            assert_eq!(path.len(), 64);
        }
    }
}

#[test]
fn root_persistence_keeps_store_and_root_consistent() {
    let db = InMemoryTrieDB::default();
    let handle = db.copy();
    let trie = Trie::with_options(
        Box::new(db),
        TrieOptions {
            persist_root: true,
            ..Default::default()
        },
    )
    .unwrap();

    for i in 0u8..10 {
        trie.insert(vec![i; 3], vec![i; 20]).unwrap();
        let persisted = handle.get(ROOT_DB_KEY).unwrap().unwrap();
        assert_eq!(persisted, trie.hash().unwrap().as_bytes().to_vec());
    }

    trie.remove(&[4; 3]).unwrap();
    let persisted = handle.get(ROOT_DB_KEY).unwrap().unwrap();
    assert_eq!(persisted, trie.hash().unwrap().as_bytes().to_vec());
}

#[test]
fn failed_mutation_leaves_root_unchanged() {
    let trie = Trie::with_options(
        Box::new(InMemoryTrieDB::default()),
        TrieOptions {
            persist_root: true,
            ..Default::default()
        },
    )
    .unwrap();
    trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();
    let root = trie.hash().unwrap();

    assert!(matches!(
        trie.insert(ROOT_DB_KEY.to_vec(), b"value".to_vec()),
        Err(TrieError::ReservedKey)
    ));
    assert_eq!(trie.hash().unwrap(), root);
}

#[test]
fn copies_share_the_store_but_not_the_root() {
    let trie = Trie::new_temp();
    trie.insert(b"shared".to_vec(), b"before".to_vec()).unwrap();

    let copy = trie.copy().unwrap();
    copy.insert(b"extra".to_vec(), b"entry".to_vec()).unwrap();
    copy.insert(b"shared".to_vec(), b"after".to_vec()).unwrap();

    // the original root still resolves against the shared store
    assert_eq!(trie.get(b"shared").unwrap(), Some(b"before".to_vec()));
    assert_eq!(trie.get(b"extra").unwrap(), None);
    assert_eq!(copy.get(b"shared").unwrap(), Some(b"after".to_vec()));
    assert_eq!(copy.get(b"extra").unwrap(), Some(b"entry".to_vec()));
}

#[test]
fn witness_covers_all_nodes_needed_to_replay_a_read() {
    let trie = Trie::new_temp();
    for i in 0u8..64 {
        trie.insert(vec![i, i / 2], vec![i; 40]).unwrap();
    }
    let root = trie.hash().unwrap();

    let (witness, logged) = TrieLogger::open_trie(trie);
    assert_eq!(logged.get(&[10, 5]).unwrap(), Some(vec![10; 40]));

    // replaying the read over only the recorded bodies must succeed
    let replay_db = InMemoryTrieDB::default();
    for body in witness.lock().unwrap().iter() {
        replay_db
            .put(keccak256(body).as_bytes().to_vec(), body.clone())
            .unwrap();
    }
    let replay = Trie::open(Box::new(replay_db), root);
    assert_eq!(replay.get(&[10, 5]).unwrap(), Some(vec![10; 40]));
}

#[test]
fn structural_invariants_hold_after_random_ops() {
    use mpt_trie::NodeHash;
    use std::collections::HashMap;

    let trie = Trie::new_temp();
    for i in 0u16..300 {
        let key = keccak256(&i.to_be_bytes()).as_bytes()[..8].to_vec();
        trie.insert(key, vec![(i % 251) as u8; 1 + (i % 60) as usize])
            .unwrap();
    }
    for i in (0u16..300).step_by(2) {
        let key = keccak256(&i.to_be_bytes()).as_bytes()[..8].to_vec();
        trie.remove(&key).unwrap();
    }

    let mut kinds: HashMap<NodeHash, &'static str> = HashMap::new();
    let mut ext_children = Vec::new();
    trie.walker()
        .unwrap()
        .walk(|hash, node, key, ctl| {
            match node {
                Node::Branch(branch) => {
                    kinds.insert(*hash, "branch");
                    // every branch keeps at least two meaningful entries
                    let meaningful =
                        branch.choices.iter().filter(|child| child.is_valid()).count()
                            + usize::from(!branch.value.is_empty());
                    assert!(meaningful >= 2);
                }
                Node::Extension(ext) => {
                    kinds.insert(*hash, "extension");
                    assert!(!ext.prefix.is_empty());
                    ext_children.push(ext.child);
                }
                Node::Leaf(_) => {
                    kinds.insert(*hash, "leaf");
                }
            }
            // hashed refs point at stored bodies of at least hash length,
            // inline refs stay strictly below it
            if let NodeHash::Hashed(stored) = hash {
                let body = trie.db().get(stored.as_bytes()).unwrap().unwrap();
                assert!(body.len() >= mpt_trie::HASH_LEN);
            } else {
                assert!(hash.as_ref().len() < mpt_trie::HASH_LEN);
            }
            ctl.all_children(node, key);
        })
        .unwrap();

    // extensions never chain
    for child in ext_children {
        assert_ne!(kinds.get(&child).copied(), Some("extension"));
    }
}

#[test]
fn deleting_the_last_key_leaves_an_empty_trie() {
    let trie = Trie::new_temp();
    trie.insert(b"lonely".to_vec(), b"value".to_vec()).unwrap();
    assert_eq!(trie.remove(b"lonely").unwrap(), Some(b"value".to_vec()));
    assert_eq!(trie.hash().unwrap(), *EMPTY_TRIE_HASH);
    assert_eq!(trie.get(b"lonely").unwrap(), None);
}

proptest! {
    #[test]
    fn proptest_compare_against_model(data in btree_map(vec(any::<u8>(), 1..32), vec(any::<u8>(), 1..64), 1..128)) {
        let trie = Trie::new_temp();
        for (path, value) in data.clone() {
            trie.insert(path, value).unwrap();
        }
        // iteration returns exactly the model's ordered contents
        let content: Vec<_> = trie.into_iter().content().collect();
        let expected: Vec<_> = data.into_iter().collect();
        assert_eq!(content, expected);
    }

    #[test]
    fn proptest_removals_match_rebuilt_roots(data in btree_map(vec(any::<u8>(), 1..16), vec(any::<u8>(), 1..32), 4..64), victim_index in any::<usize>()) {
        let keys: Vec<_> = data.keys().cloned().collect();
        let victim = &keys[victim_index % keys.len()];

        let trie = Trie::new_temp();
        for (path, value) in data.clone() {
            trie.insert(path, value).unwrap();
        }
        trie.remove(victim).unwrap();

        let rebuilt = Trie::new_temp();
        for (path, value) in data {
            if &path != victim {
                rebuilt.insert(path, value).unwrap();
            }
        }
        assert_eq!(trie.hash().unwrap(), rebuilt.hash().unwrap());
    }

    #[test]
    fn proptest_secure_trie_round_trip(data in btree_map(vec(any::<u8>(), 1..64), vec(any::<u8>(), 1..64), 1..64)) {
        let trie = Trie::with_options(
            Box::new(InMemoryTrieDB::default()),
            TrieOptions { hash_keys: true, ..Default::default() },
        ).unwrap();
        for (path, value) in data.clone() {
            trie.insert(path, value).unwrap();
        }
        for (path, value) in data {
            assert_eq!(trie.get(&path).unwrap(), Some(value));
        }
    }
}
