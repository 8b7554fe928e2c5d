use crate::{
    nibbles::Nibbles, node::Node, node_hash::NodeHash, read_node, PathRLP, Trie, TrieDB,
    ValueRLP, EMPTY_TRIE_HASH,
};

/// Lazy in-order stream over the trie's nodes.
///
/// Holds a stack of unvisited subtrie references. Branch children go onto
/// the stack from highest choice to lowest, so pops come back in ascending
/// nibble order and keys stream out sorted without materializing more than
/// one path at a time. Hashed references hit the store only when popped.
pub struct TrieIterator {
    db: Box<dyn TrieDB>,
    stack: Vec<(Nibbles, NodeHash)>,
}

impl TrieIterator {
    pub(crate) fn new(trie: Trie) -> Self {
        let (db, root, _) = trie.into_parts();
        let mut stack = Vec::new();
        if root != *EMPTY_TRIE_HASH {
            stack.push((Nibbles::default(), NodeHash::from(root)));
        }
        Self { db, stack }
    }
}

impl Iterator for TrieIterator {
    type Item = (Nibbles, Node);

    fn next(&mut self) -> Option<Self::Item> {
        let (path, next_ref) = self.stack.pop()?;
        let node = read_node(self.db.as_ref(), &next_ref).ok().flatten()?;

        let full_path = match &node {
            Node::Leaf(leaf) => path.concat(&leaf.partial),
            Node::Extension(ext) => {
                let child_path = path.concat(&ext.prefix);
                self.stack.push((child_path.clone(), ext.child));
                child_path
            }
            Node::Branch(branch) => {
                // highest choice first, so the lowest one pops next
                for choice in (0..branch.choices.len()).rev() {
                    let child = branch.choices[choice];
                    if child.is_valid() {
                        self.stack.push((path.append_new(choice as u8), child));
                    }
                }
                path
            }
        };
        Some((full_path, node))
    }
}

impl TrieIterator {
    /// Ordered `(key, value)` pairs. A branch storing a value emits it
    /// before anything in its subtrie.
    pub fn content(self) -> impl Iterator<Item = (PathRLP, ValueRLP)> {
        self.filter_map(|(path, node)| {
            let value = match node {
                Node::Leaf(leaf) => leaf.value,
                Node::Branch(branch) => branch.value,
                Node::Extension(_) => return None,
            };
            (!value.is_empty()).then(|| (path.to_bytes(), value))
        })
    }
}
