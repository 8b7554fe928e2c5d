use mpt_trie::{Node, Trie};
use proptest::collection::{btree_map, vec};
use proptest::prelude::any;
use proptest::proptest;

#[test]
fn iteration_is_ordered_and_complete() {
    let expected_content = vec![
        (vec![0x05, 0x17], b"ant".to_vec()),
        (vec![0x05, 0x80], b"bee".to_vec()),
        (vec![0x63], b"cow".to_vec()),
        (vec![0x63, 0x00, 0x41], b"elk".to_vec()),
        (vec![0xd9, 0xd9], b"fox".to_vec()),
    ];
    let trie = Trie::new_temp();
    // insert out of order on purpose
    for (path, value) in expected_content.iter().rev() {
        trie.insert(path.clone(), value.clone()).unwrap()
    }
    let content = trie.into_iter().content().collect::<Vec<_>>();
    assert_eq!(content, expected_content);
}

#[test]
fn node_stream_visits_parents_before_children() {
    let trie = Trie::new_temp();
    for i in 0u8..32 {
        trie.insert(vec![i, i], vec![i; 40]).unwrap();
    }

    let mut seen_leaf_paths = Vec::new();
    for (path, node) in trie.into_iter() {
        if let Node::Leaf(_) = node {
            // an interior node is never yielded after a leaf below it, so by
            // the time a leaf shows up its whole path has been traversed
            seen_leaf_paths.push(path);
        }
    }
    assert_eq!(seen_leaf_paths.len(), 32);
    // leaf paths come out in ascending nibble order
    let mut sorted = seen_leaf_paths.clone();
    sorted.sort();
    assert_eq!(seen_leaf_paths, sorted);
}

#[test]
fn iterator_is_finite_and_not_restartable() {
    let trie = Trie::new_temp();
    trie.insert(b"dog".to_vec(), b"puppy".to_vec()).unwrap();

    let mut iter = trie.into_iter();
    assert!(iter.next().is_some());
    assert!(iter.next().is_none());
    // once drained, the stream stays empty
    assert!(iter.next().is_none());
}

#[test]
fn empty_trie_yields_nothing() {
    let trie = Trie::new_temp();
    assert_eq!(trie.into_iter().count(), 0);
}

proptest! {
    #[test]
    fn proptest_content_matches_model(data in btree_map(vec(any::<u8>(), 1..24), vec(any::<u8>(), 1..48), 2..80)) {
        let expected_content = data.clone().into_iter().collect::<Vec<_>>();
        let trie = Trie::new_temp();
        for (path, value) in data.into_iter() {
            trie.insert(path, value).unwrap()
        }
        let content = trie.into_iter().content().collect::<Vec<_>>();
        assert_eq!(content, expected_content);
    }
}
