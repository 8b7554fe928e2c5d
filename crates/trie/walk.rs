use std::collections::VecDeque;

use ethereum_types::H256;

use crate::{
    error::TrieError,
    nibbles::Nibbles,
    node::{BranchNode, Node},
    node_hash::{HashFn, NodeHash},
    read_node, TrieDB, EMPTY_TRIE_HASH,
};

/// Queue-driven trie traversal, decoupled from recursion.
///
/// Work items are `(node ref, key so far)` pairs. The caller's callback
/// inspects each loaded node and decides what to enqueue next through
/// [`WalkControl`]; traversal ends when the queue drains.
pub struct TrieWalker<'a> {
    db: &'a dyn TrieDB,
    queue: VecDeque<(NodeHash, Nibbles)>,
    hash_fn: HashFn,
    swallow_missing: bool,
}

impl<'a> TrieWalker<'a> {
    pub fn new(db: &'a dyn TrieDB, root: H256, hash_fn: HashFn) -> Self {
        let mut queue = VecDeque::new();
        if root != *EMPTY_TRIE_HASH {
            queue.push_back((NodeHash::from(root), Nibbles::default()));
        }
        Self {
            db,
            queue,
            hash_fn,
            swallow_missing: false,
        }
    }

    /// Skip nodes whose bodies are absent from the store instead of failing
    /// with [`TrieError::MissingNode`].
    pub fn swallow_missing(mut self) -> Self {
        self.swallow_missing = true;
        self
    }

    /// Drain the work queue, invoking `on_found` for every loaded node.
    pub fn walk<F>(mut self, mut on_found: F) -> Result<(), TrieError>
    where
        F: FnMut(&NodeHash, &Node, &Nibbles, &mut WalkControl),
    {
        while let Some((hash, key)) = self.queue.pop_front() {
            let node = match read_node(self.db, &hash)? {
                Some(node) => node,
                None if self.swallow_missing => continue,
                None => return Err(TrieError::MissingNode(hash.finalize(self.hash_fn))),
            };
            let mut ctl = WalkControl::default();
            on_found(&hash, &node, &key, &mut ctl);
            self.queue.extend(ctl.pending);
        }
        Ok(())
    }
}

/// Handle through which a walk callback schedules further traversal.
#[derive(Default)]
pub struct WalkControl {
    pending: Vec<(NodeHash, Nibbles)>,
}

impl WalkControl {
    /// Enqueue every non-empty child of the node: branch children with their
    /// nibble appended, an extension child with the prefix consumed.
    pub fn all_children(&mut self, node: &Node, key: &Nibbles) {
        match node {
            Node::Branch(branch) => {
                for (choice, child) in branch.choices.iter().enumerate() {
                    if child.is_valid() {
                        self.pending.push((*child, key.append_new(choice as u8)));
                    }
                }
            }
            Node::Extension(ext) => {
                if ext.child.is_valid() {
                    self.pending.push((ext.child, key.concat(&ext.prefix)));
                }
            }
            Node::Leaf(_) => {}
        }
    }

    /// Enqueue one specific branch child.
    pub fn only_branch(&mut self, branch: &BranchNode, key: &Nibbles, choice: usize) {
        if let Some(child) = branch.choices.get(choice) {
            if child.is_valid() {
                self.pending.push((*child, key.append_new(choice as u8)));
            }
        }
    }
}
