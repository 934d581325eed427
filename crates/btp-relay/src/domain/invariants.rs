//! # Domain Invariants
//!
//! Rules every relay message must satisfy.

use super::entities::ReceiptProof;
use super::errors::RelayError;
use crate::algorithms::hashing::sha3_256;

/// Signature of the relayed event.
pub const EVENT_SIGNATURE: &str = "Message(str,int,bytes)";

/// Position of the signature in `EventLog::indexed`.
pub const EVENT_INDEX_SIGNATURE: usize = 0;

/// Position of the next-hop address in `EventLog::indexed`.
pub const EVENT_INDEX_NEXT: usize = 1;

/// Position of the sequence number in `EventLog::indexed`.
pub const EVENT_INDEX_SEQUENCE: usize = 2;

/// Position of the message payload in `EventLog::data`.
pub const EVENT_DATA_MESSAGE: usize = 0;

/// Invariant: fetched header bytes hash to the notified block hash.
///
/// This is the only anchor tying the relay message to the notified block.
/// A mismatch aborts the whole build. Checked on the raw bytes, before any
/// decoding.
pub fn invariant_block_hash_matches(
    height: i64,
    raw_header: &[u8],
    notified_hash: &[u8],
) -> Result<(), RelayError> {
    let computed = sha3_256(raw_header);
    if computed.as_slice() != notified_hash {
        return Err(RelayError::BlockHashMismatch {
            height,
            expected: format!("0x{}", hex::encode(notified_hash)),
            actual: format!("0x{}", hex::encode(computed)),
        });
    }
    Ok(())
}

/// Invariant: every event has exactly one proof, in the same order.
pub fn invariant_receipt_proof_aligned(proof: &ReceiptProof) -> Result<(), RelayError> {
    if proof.event_proofs.len() != proof.events.len() {
        return Err(RelayError::EventShape(format!(
            "receipt {} has {} event proofs for {} events",
            proof.index,
            proof.event_proofs.len(),
            proof.events.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Event, EventProof};

    #[test]
    fn test_hash_matches() {
        assert!(invariant_block_hash_matches(7, &[0xde, 0xad], &sha3_256(&[0xde, 0xad])).is_ok());
    }

    #[test]
    fn test_hash_mismatch() {
        let err = invariant_block_hash_matches(7, &[0xde, 0xad], &[0u8; 32]).unwrap_err();
        match err {
            RelayError::BlockHashMismatch { height, expected, actual } => {
                assert_eq!(height, 7);
                assert_eq!(expected, format!("0x{}", "00".repeat(32)));
                assert_eq!(actual, format!("0x{}", hex::encode(sha3_256(&[0xde, 0xad]))));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_receipt_alignment() {
        let mut rp = ReceiptProof {
            index: 1,
            event_proofs: vec![EventProof::default()],
            events: vec![Event::default()],
            ..Default::default()
        };
        assert!(invariant_receipt_proof_aligned(&rp).is_ok());

        rp.events.clear();
        assert!(invariant_receipt_proof_aligned(&rp).is_err());
    }
}
