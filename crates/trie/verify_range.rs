use std::collections::BTreeMap;

use ethereum_types::H256;

use crate::{
    keccak256,
    nibbles::Nibbles,
    node::Node,
    node_hash::NodeHash,
    ProofTrie, Trie, TrieError,
};

/// Checks a contiguous key/value window against the trie committed to by
/// `root`, using edge proofs for the window bounds. On success the returned
/// bool tells whether the trie holds further keys past the window's right
/// end.
///
/// An empty `proof` claims the window covers the whole trie; with an empty
/// key list on top of that, it asserts the trie at `root` is empty.
pub fn verify_range<V: AsRef<[u8]>>(
    root: H256,
    first_key: &H256,
    keys: &[H256],
    values: &[V],
    proof: &[Vec<u8>],
) -> Result<bool, TrieError> {
    if keys.len() != values.len() {
        return Err(TrieError::Verify(format!(
            "window has {} keys but {} values",
            keys.len(),
            values.len()
        )));
    }
    // Keys must come strictly ascending, and a stored value can never be
    // empty (empty means absent).
    for pair in keys.windows(2) {
        if pair[0] >= pair[1] {
            return Err(TrieError::Verify(String::from(
                "window keys are not strictly ascending",
            )));
        }
    }
    if values.iter().any(|value| value.as_ref().is_empty()) {
        return Err(TrieError::Verify(String::from(
            "window contains an empty value",
        )));
    }

    let trie = Trie::new_temp();

    // Without a proof the window must be the entire trie: rebuilding it has
    // to land exactly on the claimed root.
    if proof.is_empty() {
        for (key, value) in keys.iter().zip(values.iter()) {
            trie.insert(key.0.to_vec(), value.as_ref().to_vec())?;
        }
        let rebuilt = trie.hash()?;
        if rebuilt != root {
            return Err(TrieError::Verify(format!(
                "window does not rebuild the trie: wanted root {root:#x}, built {rebuilt:#x}",
            )));
        }
        return Ok(false);
    }

    // A proof with no keys asserts that nothing is stored at `first_key` or
    // anywhere to its right.
    if keys.is_empty() {
        let scan = scan_proof(proof, root.into(), *first_key, None, None)?;
        if scan.refs_past_window > 0 || !scan.lower_edge_value.is_empty() {
            return Err(TrieError::Verify(
                "trie holds entries at or past the claimed-empty window".to_string(),
            ));
        }
        return Ok(false);
    }

    let last_key = keys
        .last()
        .ok_or_else(|| TrieError::Verify("window unexpectedly empty".to_string()))?;

    // A one-key window whose bounds coincide is an existence proof for that
    // single key.
    if keys.len() == 1 && first_key == last_key {
        if first_key != &keys[0] {
            return Err(TrieError::Verify(
                "window key does not match its bounds".to_string(),
            ));
        }
        let scan = scan_proof(
            proof,
            root.into(),
            *first_key,
            Some(*last_key),
            Some(keys[0]),
        )?;
        if scan.lower_edge_value != values[0].as_ref() {
            return Err(TrieError::Verify(
                "proved value does not match the claimed one".to_string(),
            ));
        }
        return Ok(scan.refs_past_window > 0);
    }

    // General shape: a left edge proof and a right edge proof bracketing the
    // window.
    if first_key >= last_key {
        return Err(TrieError::Verify("window bounds are inverted".to_string()));
    }

    let scan = scan_proof(
        proof,
        root.into(),
        *first_key,
        Some(*last_key),
        Some(keys[0]),
    )?;

    // The window pairs rebuild the trie's interior; everything the scan kept
    // opaque is grafted back around them.
    for (key, value) in keys.iter().zip(values.iter()) {
        trie.insert(key.0.to_vec(), value.as_ref().to_vec())?;
    }
    let mut trie = ProofTrie::from(trie);
    for (path, subtree) in scan.outside_refs {
        trie.insert(path, subtree)?;
    }

    let rebuilt = trie.hash()?;
    if rebuilt != root {
        return Err(TrieError::Verify(format!(
            "window does not rebuild the trie: wanted root {root:#x}, built {rebuilt:#x}",
        )));
    }
    Ok(scan.refs_past_window > 0)
}

/// Proof nodes indexed by hash so the scan can resolve references.
struct RangeProof<'a> {
    node_refs: BTreeMap<H256, &'a [u8]>,
}

impl<'a> From<&'a [Vec<u8>]> for RangeProof<'a> {
    fn from(proof: &'a [Vec<u8>]) -> Self {
        let node_refs = proof
            .iter()
            .map(|node| (keccak256(node), node.as_slice()))
            .collect();
        RangeProof { node_refs }
    }
}

impl RangeProof<'_> {
    /// Resolve a reference against the proof. Inline references carry their
    /// body with them and always resolve; hashed ones may be absent.
    fn resolve(&self, hash: NodeHash) -> Result<Option<Node>, TrieError> {
        match hash {
            NodeHash::Inline(_) => Ok(Some(Node::decode_raw(hash.as_ref())?)),
            NodeHash::Hashed(hash) => self
                .node_refs
                .get(&hash)
                .map(|encoded| Node::decode(encoded).map_err(TrieError::RLPDecode))
                .transpose(),
        }
    }
}

/// What a walk over the proof nodes learned about the window.
struct ProofScan {
    /// Subtree references hanging outside the window, with the path they
    /// attach at. The rebuilt range trie grafts these back verbatim.
    outside_refs: Vec<(Nibbles, NodeHash)>,
    /// Value stored exactly at the window's lower bound, if any.
    lower_edge_value: Vec<u8>,
    /// References pointing strictly past the window's upper bound. Zero
    /// means the window reaches the trie's right end.
    refs_past_window: usize,
}

/// Walk every proof node reachable from the root and sort each child
/// reference into one of three fates: interior of the window (dropped, the
/// window pairs rebuild it), on an edge path (must resolve through the
/// proof, keeps being walked), or outside the window (kept opaque).
///
/// `lowest_key` is the smallest key actually present in the window, used to
/// recognize absence proofs whose path never reaches a stored entry.
fn scan_proof(
    raw_proof: &[Vec<u8>],
    root: NodeHash,
    lower: H256,
    upper: Option<H256>,
    lowest_key: Option<H256>,
) -> Result<ProofScan, TrieError> {
    let proof = RangeProof::from(raw_proof);
    let lower = Nibbles::from_bytes(lower.as_bytes());
    // A missing upper edge degenerates the window to its lower path.
    let upper = match upper {
        Some(key) => Nibbles::from_bytes(key.as_bytes()),
        None => lower.clone(),
    };
    let lowest_key = lowest_key.map(|key| Nibbles::from_bytes(key.as_bytes()));

    let mut scan = ProofScan {
        outside_refs: Vec::new(),
        lower_edge_value: Vec::new(),
        refs_past_window: 0,
    };

    let root_node = proof.resolve(root)?.ok_or_else(|| {
        TrieError::Verify(format!("range proof does not include the root node {root:?}"))
    })?;
    let mut root_path = Nibbles::default();
    if let Node::Leaf(leaf) = &root_node {
        root_path.extend(&leaf.partial);
    }

    let mut pending = vec![(root_path, root_node)];
    while let Some((path, node)) = pending.pop() {
        let stored = match node {
            Node::Leaf(leaf) => leaf.value,
            Node::Extension(ext) => {
                let child_path = path.concat(&ext.prefix);
                place_child(&mut scan, &mut pending, &proof, (&lower, &upper),
                    lowest_key.as_ref(), child_path, ext.child)?;
                Vec::new()
            }
            Node::Branch(branch) => {
                for (choice, child) in branch.choices.iter().enumerate() {
                    if child.is_valid() {
                        place_child(&mut scan, &mut pending, &proof, (&lower, &upper),
                            lowest_key.as_ref(), path.append_new(choice as u8), *child)?;
                    }
                }
                branch.value
            }
        };
        if !stored.is_empty() && path == lower {
            scan.lower_edge_value = stored;
        }
    }

    Ok(scan)
}

fn place_child(
    scan: &mut ProofScan,
    pending: &mut Vec<(Nibbles, Node)>,
    proof: &RangeProof,
    (lower, upper): (&Nibbles, &Nibbles),
    lowest_key: Option<&Nibbles>,
    mut path: Nibbles,
    child: NodeHash,
) -> Result<(), TrieError> {
    let past_lower = lower.compare_prefix(&path).is_lt();
    let before_upper = upper.compare_prefix(&path).is_gt();
    if past_lower && before_upper {
        // strictly interior: the window pairs recreate this subtree
        return Ok(());
    }
    if past_lower && upper.compare_prefix(&path).is_lt() {
        scan.refs_past_window += 1;
    }

    let Some(node) = proof.resolve(child)? else {
        // references on an edge path must be backed by the proof
        if lower.compare_prefix(&path).is_eq() || upper.compare_prefix(&path).is_eq() {
            return Err(TrieError::Verify(format!(
                "proof is missing a node on the window edge: {child:?}"
            )));
        }
        scan.outside_refs.push((path, child));
        return Ok(());
    };

    // An absence proof for the lower bound walks a path holding no window
    // content at all. Subtrees branching off strictly before the lowest
    // stored key stay opaque; their hash already commits to everything
    // underneath.
    if lowest_key.is_some_and(|lowest| lowest.compare_prefix(&path).is_gt()) {
        scan.outside_refs.push((path, child));
        return Ok(());
    }

    // Leaves occupy their whole remaining path, so account for it before
    // deciding which side of the window they land on.
    if let Node::Leaf(leaf) = &node {
        path.extend(&leaf.partial);
    }
    if upper.compare_prefix(&path).is_lt() {
        scan.outside_refs.push((path.clone(), child));
    }
    pending.push((path, node));
    Ok(())
}
