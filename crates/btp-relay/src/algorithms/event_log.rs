//! # Event Log Decoder
//!
//! Turns an event inclusion proof into the event log stored at its leaf.
//!
//! Only the shape is checked here. Node linkage is checked by
//! [`resolve_leaf`]; whether the root is committed by a block header is the
//! destination verifier's concern.

use super::mpt::resolve_leaf;
use crate::domain::{EventLog, RelayError};

/// Decode the event log at the leaf of `proof` (root node first).
pub fn decode_leaf<T: AsRef<[u8]>>(proof: &[T]) -> Result<EventLog, RelayError> {
    let leaf = resolve_leaf(proof)?;
    EventLog::decode(&leaf.data).map_err(|e| RelayError::EventLogDecode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithms::hashing::sha3_256;
    use crate::algorithms::rlp::{encode_bytes, encode_list};

    fn sample_log() -> EventLog {
        EventLog {
            addr: vec![0x01; 21],
            indexed: vec![
                b"Message(str,int,bytes)".to_vec(),
                b"btp://0x8.pra/0x5CC".to_vec(),
                vec![0x05],
            ],
            data: vec![b"payload".to_vec()],
        }
    }

    fn leaf_node(value: &[u8]) -> Vec<u8> {
        encode_list(&[encode_bytes(&[0x20]), encode_bytes(value)])
    }

    #[test]
    fn test_decode_single_node_proof() {
        let log = sample_log();
        let decoded = decode_leaf(&[leaf_node(&log.encode())]).unwrap();
        assert_eq!(decoded, log);
    }

    #[test]
    fn test_decode_two_node_proof() {
        let log = sample_log();
        let leaf = leaf_node(&log.encode());
        let mut branch: Vec<Vec<u8>> = (0..17).map(|_| encode_bytes(&[])).collect();
        branch[0] = encode_bytes(&sha3_256(&leaf));
        let root = encode_list(&branch);

        let decoded = decode_leaf(&[root, leaf]).unwrap();
        assert_eq!(decoded.indexed.len(), 3);
        assert_eq!(decoded.data[0], b"payload");
    }

    #[test]
    fn test_leaf_not_an_event_log() {
        let err = decode_leaf(&[leaf_node(b"raw bytes, not a list")]).unwrap_err();
        assert!(matches!(err, RelayError::EventLogDecode(_)));

        let short = encode_list(&[encode_bytes(&[0x01])]);
        let err = decode_leaf(&[leaf_node(&short)]).unwrap_err();
        assert!(matches!(err, RelayError::EventLogDecode(_)));
    }

    #[test]
    fn test_bad_structure_is_not_a_log_error() {
        let err = decode_leaf(&[encode_bytes(b"not a node")]).unwrap_err();
        assert!(matches!(err, RelayError::ProofStructure(_)));
    }
}
