use ethereum_types::H256;
use sha3::{Digest, Keccak256};

/// Output length of the configured hash function, in bytes.
/// Node bodies at least this long are stored under their hash; shorter ones
/// are embedded in their parent.
pub const HASH_LEN: usize = 32;

/// Hash function over byte strings, swappable at trie construction.
pub type HashFn = fn(&[u8]) -> H256;

/// Keccak-256, the default hash function.
pub fn keccak256(data: &[u8]) -> H256 {
    H256(Keccak256::digest(data).into())
}

/// Reference to a trie node, as embedded in its parent.
///
/// Nodes whose RLP encoding reaches [`HASH_LEN`] bytes are persisted and
/// referenced by hash; shorter ones are carried inline (raw RLP body plus its
/// length). An inline ref of length zero is the empty (absent) reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeHash {
    Hashed(H256),
    Inline(([u8; 31], u8)),
}

impl NodeHash {
    /// Build the reference for a node body: hash it if it is long enough to be
    /// stored on its own, embed it otherwise.
    pub fn from_encoded_raw(encoded: &[u8], hash_fn: HashFn) -> NodeHash {
        if encoded.len() >= HASH_LEN {
            NodeHash::Hashed(hash_fn(encoded))
        } else {
            NodeHash::from_slice(encoded)
        }
    }

    /// Build a reference from raw bytes: 32 bytes are a hash, anything shorter
    /// is an inline body. Longer inputs are truncated to hash length.
    pub fn from_slice(slice: &[u8]) -> NodeHash {
        match slice.len() {
            0..=31 => {
                let mut buf = [0u8; 31];
                buf[..slice.len()].copy_from_slice(slice);
                NodeHash::Inline((buf, slice.len() as u8))
            }
            _ => NodeHash::Hashed(H256::from_slice(&slice[..HASH_LEN])),
        }
    }

    /// Force the reference into a full hash, hashing the inline body if needed.
    /// Used for the root node, which is always addressed by hash.
    pub fn finalize(&self, hash_fn: HashFn) -> H256 {
        match self {
            NodeHash::Hashed(hash) => *hash,
            NodeHash::Inline(_) => hash_fn(self.as_ref()),
        }
    }

    /// Returns true if the reference points at a node (an inline ref of length
    /// zero is an empty child slot).
    pub const fn is_valid(&self) -> bool {
        !matches!(self, NodeHash::Inline((_, 0)))
    }

}

impl Default for NodeHash {
    fn default() -> Self {
        NodeHash::Inline(([0; 31], 0))
    }
}

impl From<H256> for NodeHash {
    fn from(hash: H256) -> Self {
        NodeHash::Hashed(hash)
    }
}

impl AsRef<[u8]> for NodeHash {
    fn as_ref(&self) -> &[u8] {
        match self {
            NodeHash::Hashed(hash) => hash.as_bytes(),
            NodeHash::Inline((data, len)) => &data[..*len as usize],
        }
    }
}

impl From<NodeHash> for Vec<u8> {
    fn from(hash: NodeHash) -> Self {
        hash.as_ref().to_vec()
    }
}
