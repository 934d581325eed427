//! # Merkle Patricia Trie Proofs
//!
//! Resolves the leaf of an inclusion proof given as an ordered node path
//! (root first).
//!
//! ## Node forms
//!
//! - Leaf: `[hex_prefix(path, leaf=true), value]`
//! - Extension: `[hex_prefix(path, leaf=false), child_ref]`
//! - Branch: `[child_ref[0], ..., child_ref[15], value]`
//!
//! A child reference is the SHA3-256 hash of the child node, or the child
//! node itself when its encoding is shorter than 32 bytes.
//!
//! The walk is a plain loop with a depth limit; it never recurses.

use super::hashing::sha3_256;
use super::rlp::{self, RlpItem};
use crate::domain::{Hash, RelayError};

/// Maximum number of nodes accepted in one proof.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Number of items in a branch node.
const BRANCH_WIDTH: usize = 17;

/// Reference from a parent node to a child.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ChildRef {
    /// No child.
    #[default]
    Empty,
    /// Hash of the child encoding.
    Hash(Hash),
    /// Child encoding stored inline.
    Embedded(Vec<u8>),
}

impl ChildRef {
    fn from_item(item: &RlpItem<'_>) -> Result<Self, RelayError> {
        match item {
            RlpItem::Null => Ok(ChildRef::Empty),
            RlpItem::Bytes(b) if b.is_empty() => Ok(ChildRef::Empty),
            RlpItem::Bytes(b) => {
                let hash: Hash = (*b).try_into().map_err(|_| {
                    RelayError::ProofStructure(format!("child reference of {} bytes", b.len()))
                })?;
                Ok(ChildRef::Hash(hash))
            }
            RlpItem::List(_) => Ok(ChildRef::Embedded(rlp::encode_item(item))),
        }
    }

    /// True if this reference points at the node encoded as `raw`.
    pub fn points_to(&self, raw: &[u8]) -> bool {
        match self {
            ChildRef::Empty => false,
            ChildRef::Hash(h) => *h == sha3_256(raw),
            ChildRef::Embedded(e) => e.as_slice() == raw,
        }
    }
}

/// A decoded trie node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MptNode {
    /// Terminal node carrying a value.
    Leaf {
        /// Remaining key nibbles.
        path: Vec<u8>,
        /// Stored value.
        value: Vec<u8>,
    },
    /// Shared prefix with one child.
    Extension {
        /// Shared key nibbles.
        path: Vec<u8>,
        /// Child reference.
        child: ChildRef,
    },
    /// 16-way branch with optional value.
    Branch {
        /// Child references indexed by nibble.
        children: Box<[ChildRef; 16]>,
        /// Value for keys ending here (empty if none).
        value: Vec<u8>,
    },
}

impl MptNode {
    /// Decode one node.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let items = rlp::decode_list(raw)
            .map_err(|e| RelayError::ProofStructure(format!("node is not a list: {}", e)))?;

        match items.len() {
            2 => {
                let encoded_path = items[0].as_bytes().map_err(structure)?;
                let (path, is_leaf) = decode_hex_prefix(encoded_path)?;
                if is_leaf {
                    Ok(MptNode::Leaf {
                        path,
                        value: items[1].as_bytes().map_err(structure)?.to_vec(),
                    })
                } else {
                    Ok(MptNode::Extension {
                        path,
                        child: ChildRef::from_item(&items[1])?,
                    })
                }
            }
            BRANCH_WIDTH => {
                let mut children: [ChildRef; 16] = Default::default();
                for (slot, item) in children.iter_mut().zip(&items[..16]) {
                    *slot = ChildRef::from_item(item)?;
                }
                Ok(MptNode::Branch {
                    children: Box::new(children),
                    value: items[16].as_bytes().map_err(structure)?.to_vec(),
                })
            }
            n => Err(RelayError::ProofStructure(format!(
                "node with {} items",
                n
            ))),
        }
    }

    /// True if this node references the node encoded as `raw`.
    pub fn references(&self, raw: &[u8]) -> bool {
        match self {
            MptNode::Leaf { .. } => false,
            MptNode::Extension { child, .. } => child.points_to(raw),
            MptNode::Branch { children, .. } => children.iter().any(|c| c.points_to(raw)),
        }
    }

    /// Value stored in this node, if it terminates a key.
    pub fn value(&self) -> Option<&[u8]> {
        match self {
            MptNode::Leaf { value, .. } => Some(value),
            MptNode::Branch { value, .. } if !value.is_empty() => Some(value),
            _ => None,
        }
    }
}

/// Terminal node of a resolved proof.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MptLeaf {
    /// Hash of the first (root) node.
    pub root: Hash,
    /// Value bytes of the terminal node.
    pub data: Vec<u8>,
}

/// Resolve the terminal node of an inclusion proof.
///
/// Checks that the path is non-empty, within [`MAX_PROOF_DEPTH`], that every
/// node is referenced by its predecessor, and that the last node holds a
/// value. Returns the value and the root hash the path commits to.
pub fn resolve_leaf<T: AsRef<[u8]>>(proof: &[T]) -> Result<MptLeaf, RelayError> {
    if proof.is_empty() {
        return Err(RelayError::ProofStructure("empty proof".into()));
    }
    if proof.len() > MAX_PROOF_DEPTH {
        return Err(RelayError::ProofStructure(format!(
            "proof of {} nodes exceeds max depth {}",
            proof.len(),
            MAX_PROOF_DEPTH
        )));
    }

    let mut node = MptNode::decode(proof[0].as_ref())?;
    for (i, raw) in proof.iter().enumerate().skip(1) {
        let raw = raw.as_ref();
        if !node.references(raw) {
            return Err(RelayError::ProofStructure(format!(
                "node {} is not referenced by node {}",
                i,
                i - 1
            )));
        }
        node = MptNode::decode(raw)?;
    }

    let data = node
        .value()
        .ok_or_else(|| RelayError::ProofStructure("last node holds no value".into()))?
        .to_vec();

    Ok(MptLeaf {
        root: sha3_256(proof[0].as_ref()),
        data,
    })
}

/// Encode a leaf node holding `value` under the full byte key `key`.
pub fn encode_leaf(key: &[u8], value: &[u8]) -> Vec<u8> {
    let mut path = Vec::with_capacity(key.len() + 1);
    path.push(0x20);
    path.extend_from_slice(key);
    rlp::encode_list(&[rlp::encode_bytes(&path), rlp::encode_bytes(value)])
}

/// Decode hex-prefix encoded bytes into nibbles and the leaf flag.
fn decode_hex_prefix(encoded: &[u8]) -> Result<(Vec<u8>, bool), RelayError> {
    let Some((&first, rest)) = encoded.split_first() else {
        return Err(RelayError::ProofStructure("empty hex-prefix path".into()));
    };

    let flag = first >> 4;
    if flag > 3 {
        return Err(RelayError::ProofStructure(format!(
            "invalid hex-prefix flag {}",
            flag
        )));
    }
    let is_leaf = flag >= 2;
    let odd = flag % 2 == 1;

    let mut nibbles = Vec::with_capacity(rest.len() * 2 + 1);
    if odd {
        nibbles.push(first & 0x0F);
    }
    for &byte in rest {
        nibbles.push(byte >> 4);
        nibbles.push(byte & 0x0F);
    }
    Ok((nibbles, is_leaf))
}

fn structure(e: RelayError) -> RelayError {
    RelayError::ProofStructure(e.to_string())
}
