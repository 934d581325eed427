//! # Algorithms Module
//!
//! Codec, hashing, trie proofs and event decoding.

pub mod event;
pub mod event_log;
pub mod hashing;
pub mod mpt;
pub mod rlp;

pub use event::{decode_sequence, extract};
pub use event_log::decode_leaf;
pub use hashing::sha3_256;
pub use mpt::{encode_leaf, resolve_leaf, MptLeaf, MptNode, MAX_PROOF_DEPTH};
