use mpt_rlp::encode::RLPEncode;

use crate::{
    nibbles::Nibbles,
    node_hash::{HashFn, NodeHash},
    ValueRLP,
};

/// A Node in an Ethereum Compatible Patricia Merkle Trie
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Branch(Box<BranchNode>),
    Extension(ExtensionNode),
    Leaf(LeafNode),
}

/// 16-way radix fan-out. `choices[i]` is the subtrie entered by nibble `i`;
/// `value` is the value stored when the key ends exactly at this node.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchNode {
    pub choices: [NodeHash; 16],
    pub value: ValueRLP,
}

/// Shared path compression: `prefix` is the nibble run consumed by
/// traversing this node on the way to `child`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtensionNode {
    pub prefix: Nibbles,
    pub child: NodeHash,
}

/// Path terminator. `partial` is the key suffix from the leaf's position
/// down to the logical key.
#[derive(Debug, Clone, PartialEq)]
pub struct LeafNode {
    pub partial: Nibbles,
    pub value: ValueRLP,
}

impl BranchNode {
    /// Empty choice array for building new branch nodes
    pub const EMPTY_CHOICES: [NodeHash; 16] = [NodeHash::Inline(([0; 31], 0)); 16];

    pub const fn new(choices: [NodeHash; 16]) -> Self {
        Self {
            choices,
            value: Vec::new(),
        }
    }

    pub const fn new_with_value(choices: [NodeHash; 16], value: ValueRLP) -> Self {
        Self { choices, value }
    }

    /// Number of non-empty child slots
    pub fn valid_children(&self) -> usize {
        self.choices.iter().filter(|child| child.is_valid()).count()
    }
}

impl Default for BranchNode {
    fn default() -> Self {
        Self::new(Self::EMPTY_CHOICES)
    }
}

impl ExtensionNode {
    pub const fn new(prefix: Nibbles, child: NodeHash) -> Self {
        Self { prefix, child }
    }
}

impl LeafNode {
    pub const fn new(partial: Nibbles, value: ValueRLP) -> Self {
        Self { partial, value }
    }
}

impl From<BranchNode> for Node {
    fn from(node: BranchNode) -> Self {
        Node::Branch(Box::new(node))
    }
}

impl From<Box<BranchNode>> for Node {
    fn from(node: Box<BranchNode>) -> Self {
        Node::Branch(node)
    }
}

impl From<ExtensionNode> for Node {
    fn from(node: ExtensionNode) -> Self {
        Node::Extension(node)
    }
}

impl From<LeafNode> for Node {
    fn from(node: LeafNode) -> Self {
        Node::Leaf(node)
    }
}

/// Terminal content of an insertion: a stored value for regular writes, or a
/// bare node reference when grafting proven subtrees back into a partial trie.
pub enum ValueOrHash {
    Value(ValueRLP),
    Hash(NodeHash),
}

impl From<ValueRLP> for ValueOrHash {
    fn from(value: ValueRLP) -> Self {
        Self::Value(value)
    }
}

impl From<NodeHash> for ValueOrHash {
    fn from(value: NodeHash) -> Self {
        Self::Hash(value)
    }
}

impl Node {
    /// Computes the node's hash (or inline reference, for bodies under hash length)
    pub fn compute_hash(&self, hash_fn: HashFn) -> NodeHash {
        NodeHash::from_encoded_raw(&self.encode_to_vec(), hash_fn)
    }

    /// The value stored at this node's own position, if any
    pub fn value(&self) -> Option<&ValueRLP> {
        match self {
            Node::Branch(branch) => (!branch.value.is_empty()).then_some(&branch.value),
            Node::Extension(_) => None,
            Node::Leaf(leaf) => (!leaf.value.is_empty()).then_some(&leaf.value),
        }
    }
}
