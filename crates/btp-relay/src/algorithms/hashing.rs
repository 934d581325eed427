//! # Hashing
//!
//! SHA3-256, the source chain's block and trie node hash.

use crate::domain::Hash;
use sha3::{Digest, Sha3_256};

/// Compute SHA3-256.
pub fn sha3_256(data: &[u8]) -> Hash {
    let mut hasher = Sha3_256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha3_empty_vector() {
        assert_eq!(
            hex::encode(sha3_256(b"")),
            "a7ffc6f8bf1ed76651c14756a061d662f580ff4de43b49fa82d80a4b80f8434a"
        );
    }

    #[test]
    fn test_sha3_deterministic() {
        assert_eq!(sha3_256(b"block"), sha3_256(b"block"));
        assert_ne!(sha3_256(b"block"), sha3_256(b"blocK"));
    }
}
