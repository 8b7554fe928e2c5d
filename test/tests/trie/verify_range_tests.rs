use ethereum_types::H256;
use mpt_trie::{verify_range, Trie, TrieError, EMPTY_TRIE_HASH};
use proptest::collection::btree_set;
use proptest::prelude::any;
use proptest::proptest;

fn build_trie(keys: impl IntoIterator<Item = H256>) -> Trie {
    let trie = Trie::new_temp();
    for key in keys {
        trie.insert(key.as_bytes().to_vec(), key.as_bytes().to_vec())
            .unwrap();
    }
    trie
}

#[test]
fn verify_range_regular_case_only_branch_nodes() {
    // The trie will have keys and values ranging from 25-100
    // We will prove the range from 50-75
    // Note values are written as hashes in the form i -> [i;32]
    let trie = Trie::new_temp();
    for k in 25..100_u8 {
        trie.insert([k; 32].to_vec(), [k; 32].to_vec()).unwrap()
    }
    let mut proof = trie.get_proof(&[50; 32]).unwrap();
    proof.extend(trie.get_proof(&[75; 32]).unwrap());
    let root = trie.hash().unwrap();
    let keys = (50_u8..=75).map(|i| H256([i; 32])).collect::<Vec<_>>();
    let values = (50_u8..=75).map(|i| [i; 32].to_vec()).collect::<Vec<_>>();
    let fetch_more = verify_range(root, &keys[0], &keys, &values, &proof).unwrap();
    // Our trie contains more elements to the right
    assert!(fetch_more)
}

#[test]
fn verify_range_regular_case_mixed_nodes() {
    // Keys are clustered so the trie holds branches, extensions and leaves
    // with long partials
    let mut keys = Vec::new();
    for cluster in [0x11u8, 0x22, 0x77, 0xab] {
        for i in 0u8..8 {
            let mut key = [cluster; 32];
            key[30] = i * 3;
            key[31] = i.wrapping_mul(41);
            keys.push(H256(key));
        }
    }
    keys.sort();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    let range = &keys[5..20];
    let values: Vec<Vec<u8>> = range.iter().map(|k| k.as_bytes().to_vec()).collect();
    let mut proof = trie.get_proof(range[0].as_bytes()).unwrap();
    proof.extend(trie.get_proof(range.last().unwrap().as_bytes()).unwrap());

    let fetch_more = verify_range(root, &range[0], range, &values, &proof).unwrap();
    assert!(fetch_more);
}

#[test]
fn verify_range_full_trie_without_proof() {
    let keys: Vec<H256> = (1u8..=40).map(|i| H256([i; 32])).collect();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    let values: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
    let fetch_more = verify_range(root, &keys[0], &keys, &values, &[]).unwrap();
    assert!(!fetch_more);
}

#[test]
fn verify_range_full_trie_wrong_root_fails() {
    let keys: Vec<H256> = (1u8..=10).map(|i| H256([i; 32])).collect();
    let values: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
    let bogus = H256::repeat_byte(0x99);
    assert!(matches!(
        verify_range(bogus, &keys[0], &keys, &values, &[]),
        Err(TrieError::Verify(_))
    ));
}

#[test]
fn verify_range_single_element() {
    let keys: Vec<H256> = (1u8..=40).map(|i| H256([i; 32])).collect();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    let target = keys[7];
    let proof = trie.get_proof(target.as_bytes()).unwrap();
    let fetch_more = verify_range(
        root,
        &target,
        &[target],
        &[target.as_bytes().to_vec()],
        &proof,
    )
    .unwrap();
    // there are keys to the right of the target
    assert!(fetch_more);

    let last = keys[39];
    let proof = trie.get_proof(last.as_bytes()).unwrap();
    let fetch_more =
        verify_range(root, &last, &[last], &[last.as_bytes().to_vec()], &proof).unwrap();
    assert!(!fetch_more);
}

#[test]
fn verify_range_proof_of_absence() {
    let trie = Trie::new_temp();
    trie.insert(vec![0x00, 0x01], vec![0x00]).unwrap();
    trie.insert(vec![0x00, 0x02], vec![0x00]).unwrap();
    trie.insert(vec![0x01; 32], vec![0x00]).unwrap();

    // Obtain a proof of absence for a node that will return a branch completely outside the
    // path of the first available key.
    let mut proof = trie.get_proof(&[0x00, 0xFF]).unwrap();
    proof.extend(trie.get_proof(&[0x01; 32]).unwrap());

    let root = trie.hash().unwrap();
    let keys = &[H256([0x01u8; 32])];
    let values = &[vec![0x00u8]];

    let mut first_key = H256([0xFF; 32]);
    first_key.0[0] = 0;

    let fetch_more = verify_range(root, &first_key, keys, values, &proof).unwrap();
    assert!(!fetch_more);
}

#[test]
fn verify_range_empty_range_with_exclusion_proof() {
    let keys: Vec<H256> = (1u8..=10).map(|i| H256([i * 20; 32])).collect();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    // Prove that there is nothing at or after a key greater than every entry
    let probe = H256([0xfe; 32]);
    let proof = trie.get_proof(probe.as_bytes()).unwrap();
    let empty_keys: [H256; 0] = [];
    let empty_values: [Vec<u8>; 0] = [];
    let fetch_more = verify_range(root, &probe, &empty_keys, &empty_values, &proof).unwrap();
    assert!(!fetch_more);

    // The same claim about a key in the middle of the trie must fail
    let probe = H256([100; 32]);
    let proof = trie.get_proof(probe.as_bytes()).unwrap();
    assert!(verify_range(root, &probe, &empty_keys, &empty_values, &proof).is_err());
}

#[test]
fn verify_range_empty_trie_claims() {
    let empty_keys: [H256; 0] = [];
    let empty_values: [Vec<u8>; 0] = [];
    // a missing proof with an empty key list asserts the trie is empty
    assert!(
        !verify_range(*EMPTY_TRIE_HASH, &H256::zero(), &empty_keys, &empty_values, &[]).unwrap()
    );

    let trie = build_trie([H256::repeat_byte(1)]);
    assert!(verify_range(
        trie.hash().unwrap(),
        &H256::zero(),
        &empty_keys,
        &empty_values,
        &[]
    )
    .is_err());
}

#[test]
fn verify_range_rejects_gaps_in_the_range() {
    let keys: Vec<H256> = (1u8..=40).map(|i| H256([i; 32])).collect();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    // leave a hole at index 10
    let mut range: Vec<H256> = keys[5..15].to_vec();
    range.remove(5);
    let values: Vec<Vec<u8>> = range.iter().map(|k| k.as_bytes().to_vec()).collect();
    let mut proof = trie.get_proof(range[0].as_bytes()).unwrap();
    proof.extend(trie.get_proof(range.last().unwrap().as_bytes()).unwrap());

    assert!(verify_range(root, &range[0], &range, &values, &proof).is_err());
}

#[test]
fn verify_range_rejects_tampered_values() {
    let keys: Vec<H256> = (1u8..=40).map(|i| H256([i; 32])).collect();
    let trie = build_trie(keys.iter().copied());
    let root = trie.hash().unwrap();

    let range = &keys[5..15];
    let mut values: Vec<Vec<u8>> = range.iter().map(|k| k.as_bytes().to_vec()).collect();
    values[3] = vec![0xde, 0xad];
    let mut proof = trie.get_proof(range[0].as_bytes()).unwrap();
    proof.extend(trie.get_proof(range.last().unwrap().as_bytes()).unwrap());

    assert!(verify_range(root, &range[0], range, &values, &proof).is_err());
}

proptest! {
    // Proptest: the proven range is the whole key set
    #[test]
    fn proptest_verify_range_full_set(keys in btree_set(any::<[u8; 32]>(), 8..64)) {
        let keys: Vec<H256> = keys.into_iter().map(H256).collect();
        let trie = build_trie(keys.iter().copied());
        let root = trie.hash().unwrap();

        let values: Vec<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        let mut proof = trie.get_proof(keys[0].as_bytes()).unwrap();
        proof.extend(trie.get_proof(keys.last().unwrap().as_bytes()).unwrap());

        let fetch_more = verify_range(root, &keys[0], &keys, &values, &proof).unwrap();
        assert!(!fetch_more);
    }

    // Proptest: a window from the middle of the key set
    #[test]
    fn proptest_verify_range_window(keys in btree_set(any::<[u8; 32]>(), 32..128), start in 1usize..8, len in 4usize..16) {
        let keys: Vec<H256> = keys.into_iter().map(H256).collect();
        let trie = build_trie(keys.iter().copied());
        let root = trie.hash().unwrap();

        let end = (start + len).min(keys.len() - 1);
        proptest::prop_assume!(start < end);
        let range = &keys[start..end];
        let values: Vec<Vec<u8>> = range.iter().map(|k| k.as_bytes().to_vec()).collect();
        let mut proof = trie.get_proof(range[0].as_bytes()).unwrap();
        proof.extend(trie.get_proof(range.last().unwrap().as_bytes()).unwrap());

        let fetch_more = verify_range(root, &range[0], range, &values, &proof).unwrap();
        // end < keys.len() means there is always state to the right
        assert!(fetch_more);
    }
}
