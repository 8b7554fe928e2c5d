pub mod db;
pub mod error;
pub mod logger;
mod nibbles;
mod node;
mod node_hash;
mod proof;
mod rlp;
#[cfg(test)]
mod test_utils;
mod trie_iter;
mod verify_range;
mod walk;

use std::sync::{Mutex, RwLock};

use ethereum_types::H256;
use lazy_static::lazy_static;
use mpt_rlp::constants::RLP_NULL;
use mpt_rlp::encode::RLPEncode;

pub use self::db::{BatchOp, InMemoryTrieDB, TrieDB};
pub use self::error::TrieError;
pub use self::logger::{TrieLogger, TrieWitness};
pub use self::nibbles::Nibbles;
pub use self::node::{BranchNode, ExtensionNode, LeafNode, Node, ValueOrHash};
pub use self::node_hash::{keccak256, HashFn, NodeHash, HASH_LEN};
pub use self::proof::{verify_proof, verify_proof_with_options};
pub use self::rlp::is_raw_ref;
pub use self::trie_iter::TrieIterator;
pub use self::verify_range::verify_range;
pub use self::walk::{TrieWalker, WalkControl};

lazy_static! {
    // Hash value for an empty trie, equal to keccak(RLP_NULL)
    pub static ref EMPTY_TRIE_HASH: H256 = keccak256(&[RLP_NULL]);
}

/// Reserved store key holding the current root when root persistence is on.
/// User keys equal to it are rejected.
pub const ROOT_DB_KEY: &[u8] = b"__root__";

/// RLP-encoded trie path
pub type PathRLP = Vec<u8>;
/// RLP-encoded trie value
pub type ValueRLP = Vec<u8>;
/// RLP-encoded trie node
pub type NodeRLP = Vec<u8>;

/// Trie construction options.
pub struct TrieOptions {
    /// Initial root hash; must be [`HASH_LEN`] bytes if provided.
    pub root: Option<Vec<u8>>,
    /// Hash function used for node bodies and, in secure mode, for keys.
    pub hash_fn: HashFn,
    /// When true, every public key is replaced by `hash_fn(key)` before
    /// routing ("secure trie" mode).
    pub hash_keys: bool,
    /// When true, node bodies orphaned by a mutation are deleted from the
    /// store along with the same batch.
    pub delete_on_write: bool,
    /// When true, the current root is re-written under [`ROOT_DB_KEY`] after
    /// every mutation, and loaded from there on construction when no explicit
    /// root is given.
    pub persist_root: bool,
}

impl Default for TrieOptions {
    fn default() -> Self {
        Self {
            root: None,
            hash_fn: keccak256,
            hash_keys: false,
            delete_on_write: false,
            persist_root: false,
        }
    }
}

/// Result of walking the trie towards a key.
pub struct FoundPath {
    /// The terminal node, when the full key resolved to one (a leaf with a
    /// matching key, or a branch where the key ends). Also the last element
    /// of `stack`.
    pub node: Option<Node>,
    /// Unconsumed nibbles at the point the walk stopped.
    pub remaining: Nibbles,
    /// Nodes visited on the way, paired with their path from the root, in
    /// traversal order. Mutations rewrite these bottom-up.
    pub stack: Vec<(Nibbles, Node)>,
}

/// Ethereum-compatible Merkle Patricia Trie
pub struct Trie {
    db: Box<dyn TrieDB>,
    /// Current root hash; replaced only after a successful store batch, so
    /// readers observe either the pre- or post-mutation state.
    root: RwLock<H256>,
    /// Single-permit gate serializing mutations. Readers never take it.
    write_gate: Mutex<()>,
    hash_fn: HashFn,
    hash_keys: bool,
    delete_on_write: bool,
    persist_root: bool,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new_temp()
    }
}

impl Trie {
    /// Creates a new empty Trie over the given store with default options
    pub fn new(db: Box<dyn TrieDB>) -> Self {
        Self {
            db,
            root: RwLock::new(*EMPTY_TRIE_HASH),
            write_gate: Mutex::new(()),
            hash_fn: keccak256,
            hash_keys: false,
            delete_on_write: false,
            persist_root: false,
        }
    }

    /// Creates a trie from an already-initialized store, rooted at `root`
    pub fn open(db: Box<dyn TrieDB>, root: H256) -> Self {
        let trie = Self::new(db);
        if let Ok(mut slot) = trie.root.write() {
            *slot = root;
        }
        trie
    }

    /// Creates a trie with explicit options. The root is taken from
    /// `options.root` when given (and must be [`HASH_LEN`] bytes), otherwise
    /// from the persisted root entry when `persist_root` is set, otherwise
    /// the trie starts out empty.
    pub fn with_options(db: Box<dyn TrieDB>, options: TrieOptions) -> Result<Self, TrieError> {
        let root = match options.root {
            Some(bytes) => Some(bytes),
            None if options.persist_root => db.get(ROOT_DB_KEY)?,
            None => None,
        };
        let root = match root {
            Some(bytes) if bytes.len() == HASH_LEN => H256::from_slice(&bytes),
            Some(_) => return Err(TrieError::InvalidRoot),
            None => *EMPTY_TRIE_HASH,
        };

        Ok(Self {
            db,
            root: RwLock::new(root),
            write_gate: Mutex::new(()),
            hash_fn: options.hash_fn,
            hash_keys: options.hash_keys,
            delete_on_write: options.delete_on_write,
            persist_root: options.persist_root,
        })
    }

    /// Creates a new Trie based on a temporary InMemory DB
    pub fn new_temp() -> Self {
        Trie::new(Box::new(InMemoryTrieDB::default()))
    }

    /// Return a reference to the internal database.
    ///
    /// Warning: All changes made to the db will bypass the trie and may cause the trie to suddenly
    ///   become inconsistent.
    pub fn db(&self) -> &dyn TrieDB {
        self.db.as_ref()
    }

    /// Return the hash of the trie's root node.
    /// Returns keccak(RLP_NULL) if the trie is empty
    pub fn hash(&self) -> Result<H256, TrieError> {
        self.root
            .read()
            .map(|root| *root)
            .map_err(|_| TrieError::LockError)
    }

    /// Retrieve an RLP-encoded value from the trie given its RLP-encoded path.
    pub fn get(&self, key: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        if self.hash()? == *EMPTY_TRIE_HASH {
            return Ok(None);
        }
        let found = self.find_path_inner(self.make_path(key))?;
        Ok(found.node.and_then(|node| node.value().cloned()))
    }

    /// Insert an RLP-encoded value into the trie.
    /// An empty value is an alias for removal: empty bytes are not
    /// distinguishable from absence.
    pub fn insert(&self, key: PathRLP, value: ValueRLP) -> Result<(), TrieError> {
        self.check_reserved(&key)?;
        if value.is_empty() {
            self.remove(&key)?;
            return Ok(());
        }
        let path = self.make_path(&key);
        self.insert_inner(path, ValueOrHash::Value(value))
    }

    /// Remove a value from the trie given its RLP-encoded path.
    /// Returns the value if it was succesfully removed or None if it wasn't part of the trie
    pub fn remove(&self, key: &[u8]) -> Result<Option<ValueRLP>, TrieError> {
        self.check_reserved(key)?;
        let _permit = self.write_gate.lock().map_err(|_| TrieError::LockError)?;

        if self.root_hash()? == *EMPTY_TRIE_HASH {
            return Ok(None);
        }
        let FoundPath {
            node, mut stack, ..
        } = self.find_path_inner(self.make_path(key))?;
        // A terminal branch without a value is a miss as well
        if !node.is_some_and(|node| node.value().is_some()) {
            return Ok(None);
        }

        let mut ops = Vec::new();
        self.mark_stale(&stack, &mut ops);

        let removed = match stack.pop() {
            Some((leaf_path, Node::Leaf(leaf))) => {
                if stack.is_empty() {
                    // the trie only contained this leaf
                    self.commit(*EMPTY_TRIE_HASH, ops)?;
                    return Ok(Some(leaf.value));
                }
                {
                    let (parent_path, parent) =
                        stack.last_mut().ok_or(TrieError::StackUnderflow)?;
                    let Node::Branch(branch) = parent else {
                        // two distinct keys never share a leaf, so the parent
                        // of a removed leaf is always a branch
                        return Err(TrieError::StackUnderflow);
                    };
                    let choice = leaf_path.at(parent_path.len());
                    branch.choices[choice] = NodeHash::default();
                }
                self.collapse(&mut stack, &mut ops)?;
                leaf.value
            }
            Some((branch_path, Node::Branch(mut branch))) => {
                let value = std::mem::take(&mut branch.value);
                stack.push((branch_path, branch.into()));
                self.collapse(&mut stack, &mut ops)?;
                value
            }
            _ => return Err(TrieError::StackUnderflow),
        };

        let new_root = self.save_stack(stack, &mut ops)?;
        self.commit(new_root, ops)?;
        Ok(Some(removed))
    }

    /// Walk from the root consuming the nibbles of `key`, recording every
    /// node visited. See [`FoundPath`] for the shape of the result.
    pub fn find_path(&self, key: &[u8]) -> Result<FoundPath, TrieError> {
        self.find_path_inner(self.make_path(key))
    }

    /// Returns true iff the given root is resolvable against the store
    /// (missing-node conditions are swallowed rather than surfaced).
    pub fn check_root(&self, root: &H256) -> Result<bool, TrieError> {
        if *root == *EMPTY_TRIE_HASH {
            return Ok(true);
        }
        Ok(self.db.get(root.as_bytes())?.is_some())
    }

    /// Returns a new trie over a copied store handle, rooted at the current
    /// root. Whether the two tries interfere is up to the store's `copy`.
    pub fn copy(&self) -> Result<Trie, TrieError> {
        Ok(Trie {
            db: self.db.copy(),
            root: RwLock::new(self.root_hash()?),
            write_gate: Mutex::new(()),
            hash_fn: self.hash_fn,
            hash_keys: self.hash_keys,
            delete_on_write: self.delete_on_write,
            persist_root: self.persist_root,
        })
    }

    /// Queue-driven traversal over the current trie contents.
    pub fn walker(&self) -> Result<TrieWalker<'_>, TrieError> {
        Ok(TrieWalker::new(
            self.db.as_ref(),
            self.root_hash()?,
            self.hash_fn,
        ))
    }

    /// Validates that the trie isn't missing any nodes expected by its
    /// branches, walking every reachable node.
    pub fn validate(&self) -> Result<(), TrieError> {
        if self.root_hash()? == *EMPTY_TRIE_HASH {
            return Ok(());
        }
        let mut expected_count: i64 = 1;
        self.walker()?
            .swallow_missing()
            .walk(|_, node, key, ctl| {
                expected_count -= 1;
                match node {
                    Node::Branch(branch) => expected_count += branch.valid_children() as i64,
                    Node::Extension(_) => expected_count += 1,
                    Node::Leaf(_) => {}
                }
                ctl.all_children(node, key);
            })?;
        if expected_count != 0 {
            return Err(TrieError::Verify(format!(
                "node count mismatch, expected {expected_count} more"
            )));
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Box<dyn TrieDB>, H256, HashFn) {
        let root = self
            .root
            .into_inner()
            .unwrap_or_else(|poison| poison.into_inner());
        (self.db, root, self.hash_fn)
    }

    fn root_hash(&self) -> Result<H256, TrieError> {
        self.root
            .read()
            .map(|root| *root)
            .map_err(|_| TrieError::LockError)
    }

    fn make_path(&self, key: &[u8]) -> Nibbles {
        if self.hash_keys {
            Nibbles::from_bytes((self.hash_fn)(key).as_bytes())
        } else {
            Nibbles::from_bytes(key)
        }
    }

    fn check_reserved(&self, key: &[u8]) -> Result<(), TrieError> {
        if self.persist_root && key == ROOT_DB_KEY {
            return Err(TrieError::ReservedKey);
        }
        Ok(())
    }

    fn read_node_required(&self, hash: &NodeHash) -> Result<Node, TrieError> {
        read_node(self.db.as_ref(), hash)?
            .ok_or_else(|| TrieError::MissingNode(hash.finalize(self.hash_fn)))
    }

    pub(crate) fn find_path_inner(&self, full_path: Nibbles) -> Result<FoundPath, TrieError> {
        let mut stack: Vec<(Nibbles, Node)> = Vec::new();
        let root = self.root_hash()?;
        if root == *EMPTY_TRIE_HASH {
            return Ok(FoundPath {
                node: None,
                remaining: full_path,
                stack,
            });
        }

        let mut current = NodeHash::from(root);
        let mut remaining = full_path;
        let mut traversed = Nibbles::default();
        loop {
            let node = self.read_node_required(&current)?;
            let node_path = traversed.clone();
            match node {
                Node::Leaf(leaf) => {
                    let found = (leaf.partial == remaining)
                        .then(|| Node::Leaf(leaf.clone()));
                    if found.is_some() {
                        remaining = Nibbles::default();
                    }
                    stack.push((node_path, leaf.into()));
                    return Ok(FoundPath {
                        node: found,
                        remaining,
                        stack,
                    });
                }
                Node::Extension(ext) => {
                    if remaining.skip_prefix(&ext.prefix) {
                        traversed.extend(&ext.prefix);
                        current = ext.child;
                        stack.push((node_path, ext.into()));
                    } else {
                        stack.push((node_path, ext.into()));
                        return Ok(FoundPath {
                            node: None,
                            remaining,
                            stack,
                        });
                    }
                }
                Node::Branch(branch) => {
                    if remaining.is_empty() {
                        let found = Some(Node::Branch(branch.clone()));
                        stack.push((node_path, branch.into()));
                        return Ok(FoundPath {
                            node: found,
                            remaining,
                            stack,
                        });
                    }
                    let choice = remaining.at(0);
                    let child = branch.choices[choice];
                    stack.push((node_path, branch.into()));
                    if !child.is_valid() {
                        return Ok(FoundPath {
                            node: None,
                            remaining,
                            stack,
                        });
                    }
                    traversed.append(choice as u8);
                    remaining = remaining.offset(1);
                    current = child;
                }
            }
        }
    }

    /// Shared terminal insertion: a value for regular inserts, a bare hash
    /// reference when grafting proof subtrees.
    pub(crate) fn insert_inner(
        &self,
        path: Nibbles,
        term: ValueOrHash,
    ) -> Result<(), TrieError> {
        let _permit = self.write_gate.lock().map_err(|_| TrieError::LockError)?;

        let mut ops = Vec::new();
        let mut stack: Vec<(Nibbles, Node)>;

        if self.root_hash()? == *EMPTY_TRIE_HASH {
            match term {
                ValueOrHash::Value(value) => {
                    stack = vec![(Nibbles::default(), LeafNode::new(path, value).into())];
                }
                ValueOrHash::Hash(hash) => {
                    // Grafting into an empty trie: the reference is the root
                    if !path.is_empty() {
                        return Err(TrieError::Verify(
                            "dangling reference graft on an empty trie".to_string(),
                        ));
                    }
                    return self.commit(hash.finalize(self.hash_fn), ops);
                }
            }
        } else {
            let FoundPath {
                node,
                remaining,
                stack: found_stack,
            } = self.find_path_inner(path)?;
            stack = found_stack;
            self.mark_stale(&stack, &mut ops);

            if node.is_some() {
                let (_, terminal) = stack.last_mut().ok_or(TrieError::StackUnderflow)?;
                match (term, terminal) {
                    (ValueOrHash::Value(value), Node::Leaf(leaf)) => leaf.value = value,
                    (ValueOrHash::Value(value), Node::Branch(branch)) => branch.value = value,
                    _ => {
                        return Err(TrieError::Verify(
                            "reference graft collides with stored content".to_string(),
                        ))
                    }
                }
            } else {
                self.branch_out(&mut stack, remaining, term, &mut ops)?;
            }
        }

        let new_root = self.save_stack(stack, &mut ops)?;
        self.commit(new_root, ops)
    }

    /// Handle an unmatched key: attach under the deepest visited node,
    /// splitting it when its own key diverges mid-way.
    fn branch_out(
        &self,
        stack: &mut Vec<(Nibbles, Node)>,
        remaining: Nibbles,
        term: ValueOrHash,
        ops: &mut Vec<BatchOp>,
    ) -> Result<(), TrieError> {
        let (last_path, last_node) = stack.pop().ok_or(TrieError::StackUnderflow)?;
        match last_node {
            Node::Branch(mut branch) => {
                // find_path stopped at an empty child slot
                let choice = remaining.at(0);
                let child_path = last_path.append_new(choice as u8);
                match term {
                    ValueOrHash::Value(value) => {
                        stack.push((last_path, branch.into()));
                        stack.push((
                            child_path,
                            LeafNode::new(remaining.offset(1), value).into(),
                        ));
                    }
                    ValueOrHash::Hash(hash) if remaining.len() == 1 => {
                        branch.choices[choice] = hash;
                        stack.push((last_path, branch.into()));
                    }
                    ValueOrHash::Hash(hash) => {
                        stack.push((last_path, branch.into()));
                        stack.push((
                            child_path,
                            ExtensionNode::new(remaining.offset(1), hash).into(),
                        ));
                    }
                }
            }
            Node::Leaf(leaf) => {
                let existing_key = leaf.partial;
                let m = existing_key.count_prefix(&remaining);
                let mut branch = BranchNode::default();
                if m == existing_key.len() {
                    // the stored key ends exactly at the new branch
                    branch.value = leaf.value;
                } else {
                    let choice = existing_key.at(m);
                    let shifted = LeafNode::new(existing_key.offset(m + 1), leaf.value);
                    branch.choices[choice] = self.format_node(&shifted.into(), ops);
                }
                self.push_split(stack, last_path, remaining, m, branch, term)?;
            }
            Node::Extension(ext) => {
                // the prefix diverges mid-way, otherwise find_path would have
                // descended into the child
                let existing_key = ext.prefix;
                let m = existing_key.count_prefix(&remaining);
                let mut branch = BranchNode::default();
                let choice = existing_key.at(m);
                let rest = existing_key.offset(m + 1);
                branch.choices[choice] = if rest.is_empty() {
                    ext.child
                } else {
                    self.format_node(&ExtensionNode::new(rest, ext.child).into(), ops)
                };
                self.push_split(stack, last_path, remaining, m, branch, term)?;
            }
        }
        Ok(())
    }

    /// Push the split produced by [`branch_out`]: an optional extension over
    /// the shared prefix, the new branch, and the inserted content.
    fn push_split(
        &self,
        stack: &mut Vec<(Nibbles, Node)>,
        last_path: Nibbles,
        remaining: Nibbles,
        m: usize,
        mut branch: BranchNode,
        term: ValueOrHash,
    ) -> Result<(), TrieError> {
        let branch_path = last_path.concat(&remaining.slice(0, m));
        let mut tail = None;
        if m == remaining.len() {
            match term {
                ValueOrHash::Value(value) => branch.value = value,
                ValueOrHash::Hash(_) => {
                    return Err(TrieError::Verify(
                        "reference graft collides with stored content".to_string(),
                    ))
                }
            }
        } else {
            let choice = remaining.at(m);
            let child_path = branch_path.append_new(choice as u8);
            match term {
                ValueOrHash::Value(value) => {
                    tail = Some((
                        child_path,
                        Node::from(LeafNode::new(remaining.offset(m + 1), value)),
                    ));
                }
                ValueOrHash::Hash(hash) => {
                    let rest = remaining.offset(m + 1);
                    if rest.is_empty() {
                        branch.choices[choice] = hash;
                    } else {
                        tail = Some((child_path, ExtensionNode::new(rest, hash).into()));
                    }
                }
            }
        }

        if m > 0 {
            // child ref is patched by save_stack once the branch is hashed
            stack.push((
                last_path,
                ExtensionNode::new(remaining.slice(0, m), NodeHash::default()).into(),
            ));
        }
        stack.push((branch_path, branch.into()));
        if let Some(entry) = tail {
            stack.push(entry);
        }
        Ok(())
    }

    /// Replace a branch left with fewer than two meaningful entries by its
    /// sole content, merging into a parent extension where one exists.
    fn collapse(
        &self,
        stack: &mut Vec<(Nibbles, Node)>,
        ops: &mut Vec<BatchOp>,
    ) -> Result<(), TrieError> {
        let Some((branch_path, Node::Branch(mut branch))) = stack.pop() else {
            return Err(TrieError::StackUnderflow);
        };
        let children = branch.valid_children();
        if children + usize::from(!branch.value.is_empty()) >= 2 {
            stack.push((branch_path, branch.into()));
            return Ok(());
        }

        let collapsed: Node = if children == 1 {
            let (choice, child_hash) = branch
                .choices
                .iter()
                .enumerate()
                .find(|(_, child)| child.is_valid())
                .ok_or(TrieError::StackUnderflow)?;
            let child = self.read_node_required(child_hash)?;
            match child {
                Node::Leaf(mut leaf) => {
                    // re-keying orphans the old body
                    if self.delete_on_write {
                        if let NodeHash::Hashed(hash) = child_hash {
                            ops.push(BatchOp::Delete {
                                key: hash.as_bytes().to_vec(),
                            });
                        }
                    }
                    leaf.partial.prepend(choice as u8);
                    leaf.into()
                }
                Node::Extension(mut ext) => {
                    if self.delete_on_write {
                        if let NodeHash::Hashed(hash) = child_hash {
                            ops.push(BatchOp::Delete {
                                key: hash.as_bytes().to_vec(),
                            });
                        }
                    }
                    ext.prefix.prepend(choice as u8);
                    ext.into()
                }
                // A branch child stays where it is, wrapped by a single-nibble
                // extension
                Node::Branch(_) => {
                    ExtensionNode::new(Nibbles::from_hex(vec![choice as u8]), *child_hash).into()
                }
            }
        } else {
            // Only the branch value remains. Outside the root this leaf is
            // absorbed by the parent extension below.
            LeafNode::new(Nibbles::default(), std::mem::take(&mut branch.value)).into()
        };

        if matches!(stack.last(), Some((_, Node::Extension(_)))) {
            let Some((ext_path, Node::Extension(parent))) = stack.pop() else {
                return Err(TrieError::StackUnderflow);
            };
            let merged: Node = match collapsed {
                Node::Leaf(mut leaf) => {
                    leaf.partial = parent.prefix.concat(&leaf.partial);
                    leaf.into()
                }
                Node::Extension(mut inner) => {
                    inner.prefix = parent.prefix.concat(&inner.prefix);
                    inner.into()
                }
                // collapse never yields a branch
                Node::Branch(_) => return Err(TrieError::StackUnderflow),
            };
            stack.push((ext_path, merged));
        } else {
            stack.push((branch_path, collapsed));
        }
        Ok(())
    }

    /// Re-hash the ancestor stack bottom-up, patching each parent's child
    /// slot with the ref emitted just below it. Bodies reaching hash length,
    /// plus the root, are queued as store puts; shorter bodies become inline
    /// refs for their parent. Returns the new root hash.
    fn save_stack(
        &self,
        stack: Vec<(Nibbles, Node)>,
        ops: &mut Vec<BatchOp>,
    ) -> Result<H256, TrieError> {
        let mut child_ref: Option<(Nibbles, NodeHash)> = None;
        let mut new_root = None;

        for (path, mut node) in stack.into_iter().rev() {
            if let Some((child_path, hash)) = child_ref.take() {
                match &mut node {
                    Node::Branch(branch) => {
                        let choice = child_path.at(path.len());
                        branch.choices[choice] = hash;
                    }
                    Node::Extension(ext) => ext.child = hash,
                    Node::Leaf(_) => return Err(TrieError::StackUnderflow),
                }
            }

            let encoded = node.encode_to_vec();
            let hash = NodeHash::from_encoded_raw(&encoded, self.hash_fn);
            if path.is_empty() {
                // the root is always addressed by hash, however small
                let root = hash.finalize(self.hash_fn);
                ops.push(BatchOp::Put {
                    key: root.as_bytes().to_vec(),
                    value: encoded,
                });
                new_root = Some(root);
            } else {
                if let NodeHash::Hashed(hash) = hash {
                    ops.push(BatchOp::Put {
                        key: hash.as_bytes().to_vec(),
                        value: encoded,
                    });
                }
                child_ref = Some((path, hash));
            }
        }

        new_root.ok_or(TrieError::StackUnderflow)
    }

    /// Serialize a node created aside from the main ancestor stack (the
    /// re-keyed half of a split), queueing a store put when it is large
    /// enough to live on its own.
    fn format_node(&self, node: &Node, ops: &mut Vec<BatchOp>) -> NodeHash {
        let encoded = node.encode_to_vec();
        let hash = NodeHash::from_encoded_raw(&encoded, self.hash_fn);
        if let NodeHash::Hashed(hash) = hash {
            ops.push(BatchOp::Put {
                key: hash.as_bytes().to_vec(),
                value: encoded,
            });
        }
        hash
    }

    /// Queue deletions for the pre-mutation bodies of the visited nodes.
    /// Every rewritten ancestor orphans its old body; the root is orphaned
    /// even when its body was under hash length.
    fn mark_stale(&self, stack: &[(Nibbles, Node)], ops: &mut Vec<BatchOp>) {
        if !self.delete_on_write {
            return;
        }
        for (path, node) in stack {
            let hash = node.compute_hash(self.hash_fn);
            let key = match hash {
                NodeHash::Hashed(hash) => hash,
                NodeHash::Inline(_) if path.is_empty() => hash.finalize(self.hash_fn),
                NodeHash::Inline(_) => continue,
            };
            ops.push(BatchOp::Delete {
                key: key.as_bytes().to_vec(),
            });
        }
    }

    /// Flush the batch and only then install the new root: a failed or
    /// cancelled mutation leaves the previous root in place.
    fn commit(&self, new_root: H256, mut ops: Vec<BatchOp>) -> Result<(), TrieError> {
        if self.persist_root {
            ops.push(BatchOp::Put {
                key: ROOT_DB_KEY.to_vec(),
                value: new_root.as_bytes().to_vec(),
            });
        }
        self.db.put_batch(ops)?;
        let mut root = self.root.write().map_err(|_| TrieError::LockError)?;
        *root = new_root;
        Ok(())
    }
}

/// Load a node through its reference: inline bodies decode in place, hashed
/// ones are fetched from the store. An empty ref or an absent body is `None`.
pub(crate) fn read_node(db: &dyn TrieDB, hash: &NodeHash) -> Result<Option<Node>, TrieError> {
    match hash {
        NodeHash::Inline((_, 0)) => Ok(None),
        NodeHash::Inline(_) => Ok(Some(Node::decode_raw(hash.as_ref())?)),
        NodeHash::Hashed(hash) => db
            .get(hash.as_bytes())?
            .filter(|rlp| !rlp.is_empty())
            .map(|rlp| Node::decode(&rlp).map_err(TrieError::RLPDecode))
            .transpose(),
    }
}

impl IntoIterator for Trie {
    type Item = (Nibbles, Node);

    type IntoIter = TrieIterator;

    fn into_iter(self) -> Self::IntoIter {
        TrieIterator::new(self)
    }
}

/// Trie wrapper used while verifying range proofs: accepts bare hash
/// references for subtrees that fall outside the proven range.
pub struct ProofTrie(Trie);

impl ProofTrie {
    pub fn insert(
        &mut self,
        partial_path: Nibbles,
        external_ref: NodeHash,
    ) -> Result<(), TrieError> {
        self.0.insert_inner(partial_path, ValueOrHash::Hash(external_ref))
    }

    pub fn hash(&self) -> Result<H256, TrieError> {
        self.0.hash()
    }
}

impl From<Trie> for ProofTrie {
    fn from(value: Trie) -> Self {
        Self(value)
    }
}
