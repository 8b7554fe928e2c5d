use std::array;

// Contains RLP encoding and decoding implementations for trie nodes.
// This is the canonical node serialization: it feeds both hash computation
// and the bodies stored in the DB.
use mpt_rlp::{
    constants::RLP_NULL,
    decode::{decode_bytes, decode_rlp_item, RLPDecode},
    encode::{encode_length, RLPEncode},
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};

use crate::{
    nibbles::Nibbles,
    node::{BranchNode, ExtensionNode, LeafNode, Node},
    node_hash::NodeHash,
};

impl RLPEncode for NodeHash {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            NodeHash::Hashed(hash) => hash.encode(buf),
            NodeHash::Inline((_, 0)) => buf.put_u8(RLP_NULL),
            NodeHash::Inline((encoded, len)) => buf.put_slice(&encoded[..*len as usize]),
        }
    }

    fn length(&self) -> usize {
        match self {
            NodeHash::Hashed(hash) => RLPEncode::length(hash),
            NodeHash::Inline((_, 0)) => 1,
            NodeHash::Inline((_, len)) => *len as usize,
        }
    }
}

impl RLPEncode for BranchNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let value_len = <[u8] as RLPEncode>::length(&self.value);
        let payload_len = self
            .choices
            .iter()
            .fold(value_len, |acc, child| acc + child.length());

        encode_length(payload_len, buf);
        for child in self.choices.iter() {
            child.encode(buf);
        }
        <[u8] as RLPEncode>::encode(&self.value, buf);
    }

    fn length(&self) -> usize {
        let value_len = <[u8] as RLPEncode>::length(&self.value);
        let payload_len = self
            .choices
            .iter()
            .fold(value_len, |acc, child| acc + child.length());
        mpt_rlp::encode::list_length(payload_len)
    }

    // Duplicated to prealloc the buffer and avoid calculating the payload length twice
    fn encode_to_vec(&self) -> Vec<u8> {
        let value_len = <[u8] as RLPEncode>::length(&self.value);
        let payload_len = self
            .choices
            .iter()
            .fold(value_len, |acc, child| acc + child.length());

        let mut buf: Vec<u8> = Vec::with_capacity(payload_len + 3); // 3 byte prefix headroom

        encode_length(payload_len, &mut buf);
        for child in self.choices.iter() {
            child.encode(&mut buf);
        }
        <[u8] as RLPEncode>::encode(&self.value, &mut buf);

        buf
    }
}

impl RLPEncode for ExtensionNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        let mut encoder = Encoder::new(buf).encode_bytes(&self.prefix.encode_compact(false));
        encoder = match &self.child {
            NodeHash::Hashed(hash) => encoder.encode_field(hash),
            inline => encoder.encode_raw(inline.as_ref()),
        };
        encoder.finish();
    }

    fn length(&self) -> usize {
        let compact = self.prefix.encode_compact(false);
        let payload_len = RLPEncode::length(compact.as_slice()) + self.child.length();
        mpt_rlp::encode::list_length(payload_len)
    }
}

impl RLPEncode for LeafNode {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        Encoder::new(buf)
            .encode_bytes(&self.partial.encode_compact(true))
            .encode_bytes(&self.value)
            .finish()
    }

    fn length(&self) -> usize {
        let compact = self.partial.encode_compact(true);
        let payload_len =
            RLPEncode::length(compact.as_slice()) + <[u8] as RLPEncode>::length(&self.value);
        mpt_rlp::encode::list_length(payload_len)
    }
}

impl RLPEncode for Node {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        match self {
            Node::Branch(n) => n.encode(buf),
            Node::Extension(n) => n.encode(buf),
            Node::Leaf(n) => n.encode(buf),
        }
    }

    fn length(&self) -> usize {
        match self {
            Node::Branch(n) => n.length(),
            Node::Extension(n) => n.length(),
            Node::Leaf(n) => n.length(),
        }
    }

    fn encode_to_vec(&self) -> Vec<u8> {
        match self {
            Node::Branch(n) => n.encode_to_vec(),
            Node::Extension(n) => n.encode_to_vec(),
            Node::Leaf(n) => n.encode_to_vec(),
        }
    }
}

impl RLPDecode for Node {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let mut rlp_items_len = 0;
        let mut rlp_items: [&[u8]; 17] = [&[]; 17];
        let mut decoder = Decoder::new(rlp)?;
        let mut item;
        // Get encoded fields; check if we reached the end or if we decoded more
        // items than the ones we need
        while !decoder.is_done() && rlp_items_len < 17 {
            (item, decoder) = decoder.get_encoded_item()?;
            rlp_items[rlp_items_len] = item;
            rlp_items_len += 1;
        }
        if !decoder.is_done() {
            return Err(RLPDecodeError::Custom(
                "Invalid arg count for Node, expected 2 or 17, got more than 17".to_string(),
            ));
        }
        // Deserialize into node depending on the available fields
        let node = match rlp_items_len {
            // Leaf or Extension Node
            2 => {
                let (compact_path, _) = decode_bytes(rlp_items[0])?;
                let (path, is_leaf) = Nibbles::decode_compact(compact_path)?;
                if is_leaf {
                    // Decode as Leaf
                    let (value, _) = decode_bytes(rlp_items[1])?;
                    LeafNode {
                        partial: path,
                        value: value.to_vec(),
                    }
                    .into()
                } else {
                    // Decode as Extension
                    ExtensionNode {
                        prefix: path,
                        child: decode_child(rlp_items[1]),
                    }
                    .into()
                }
            }
            // Branch Node
            17 => {
                let choices = array::from_fn(|i| decode_child(rlp_items[i]));
                let (value, _) = decode_bytes(rlp_items[16])?;
                BranchNode {
                    choices,
                    value: value.to_vec(),
                }
                .into()
            }
            n => {
                return Err(RLPDecodeError::Custom(format!(
                    "Invalid arg count for Node, expected 2 or 17, got {n}"
                )));
            }
        };
        Ok((node, decoder.finish()?))
    }
}

impl Node {
    /// Decodes a node body stored in the DB
    pub fn decode(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        <Self as RLPDecode>::decode(rlp)
    }

    /// Decodes a node that was embedded raw inside its parent
    pub fn decode_raw(rlp: &[u8]) -> Result<Self, RLPDecodeError> {
        // Inline bodies carry the same canonical list form as stored ones
        <Self as RLPDecode>::decode(rlp)
    }
}

/// Returns true iff the given RLP item is a raw embedded node (a list) rather
/// than a hash reference (a byte string).
pub fn is_raw_ref(rlp: &[u8]) -> bool {
    decode_rlp_item(rlp)
        .map(|(is_list, _, _)| is_list)
        .unwrap_or(false)
}

fn decode_child(rlp: &[u8]) -> NodeHash {
    match decode_bytes(rlp) {
        Ok((hash, &[])) if hash.len() == 32 => NodeHash::from_slice(hash),
        Ok((&[], &[])) => NodeHash::default(),
        _ => NodeHash::from_slice(rlp),
    }
}
