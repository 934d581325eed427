//! Fixture builders shared by unit and integration tests.

use crate::domain::{BlockHeader, BlockNotification, EventLog, HexBytes, HexInt, EVENT_SIGNATURE};

/// Header at `height` with `serialized` filled in.
pub fn make_test_header(height: i64) -> BlockHeader {
    let mut header = BlockHeader {
        version: 2,
        height,
        timestamp: 1_624_000_000_000_000 + height,
        proposer: vec![0x00; 21],
        prev_id: vec![0x11; 32],
        votes_hash: vec![0x22; 32],
        next_validators_hash: vec![0x33; 32],
        patch_transactions_hash: vec![],
        normal_transactions_hash: vec![0x44; 32],
        logs_bloom: vec![0x00; 256],
        result: vec![0x55; 32],
        serialized: vec![],
    };
    header.serialized = header.encode();
    header
}

/// `Message(str,int,bytes)` event log.
pub fn make_message_log(next: &str, sequence: &[u8], message: &[u8]) -> EventLog {
    EventLog {
        addr: vec![0x01; 21],
        indexed: vec![
            EVENT_SIGNATURE.as_bytes().to_vec(),
            next.as_bytes().to_vec(),
            sequence.to_vec(),
        ],
        data: vec![message.to_vec()],
    }
}

/// Notification with one filter: `matches` lists (tx index, event indexes).
pub fn make_notification(
    hash: &[u8],
    height: i64,
    matches: &[(i64, Vec<i64>)],
) -> BlockNotification {
    let (indexes, events) = if matches.is_empty() {
        (vec![], vec![])
    } else {
        (
            vec![matches.iter().map(|(i, _)| HexInt::from_i64(*i)).collect()],
            vec![matches
                .iter()
                .map(|(_, e)| e.iter().map(|v| HexInt::from_i64(*v)).collect())
                .collect()],
        )
    };
    BlockNotification {
        hash: HexBytes::from_bytes(hash),
        height: HexInt::from_i64(height),
        indexes,
        events,
    }
}
