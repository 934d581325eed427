//! # Relay Pipeline Tests
//!
//! Drive the full notification → relay message pipeline against the
//! in-memory source chain and block monitor.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use btp_relay::test_utils::{make_message_log, make_notification, make_test_header};
use btp_relay::{
    BlockProof, BlockUpdate, BlockUpdateEnvelope, BlockWitness, ErrorKind, MockBlockMonitor,
    MockSourceChain, ReceiptProof, RelayApi, RelayConfig, RelayError, RelayMessage, RelayService,
};
use proptest::prelude::*;

const NEXT: &str = "btp://0x8.pra/0x5CC307268a1393AB9A764A20DACE848AB8275c46";

// =============================================================================
// TEST HELPERS
// =============================================================================

fn make_service(chain: MockSourceChain) -> RelayService<MockSourceChain> {
    RelayService::new(RelayConfig::for_testing(), Arc::new(chain))
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// =============================================================================
// END TO END
// =============================================================================

#[tokio::test]
async fn test_height_9085_end_to_end() {
    let header = make_test_header(9085);
    let mut chain = MockSourceChain::default();
    let hash = chain
        .insert_block(&header.serialized, b"votes".to_vec(), b"validators".to_vec())
        .unwrap();
    let payload = b"relay payload".to_vec();
    chain.insert_event(&hash, 0, 0, &make_message_log(NEXT, &[0x00, 0x00, 0x2a], &payload));

    let monitor = MockBlockMonitor {
        notifications: vec![make_notification(&hash, 9085, &[(0, vec![0])])],
        ..Default::default()
    };
    let service = make_service(chain);

    let message = service.run_from_height(&monitor, 9085).await.unwrap();

    assert_eq!(message.block_updates.len(), 1);
    let envelope = BlockUpdateEnvelope::decode(&message.block_updates[0]).unwrap();
    assert_eq!(envelope.block_header, header.serialized);
    assert_eq!(envelope.votes, b"votes");
    assert_eq!(envelope.validators, b"validators");

    assert_eq!(message.receipt_proofs.len(), 1);
    let receipt = ReceiptProof::decode(&message.receipt_proofs[0]).unwrap();
    assert_eq!(receipt.events.len(), 1);
    assert_eq!(receipt.event_proofs.len(), 1);
    let event = &receipt.events[0];
    assert_eq!(event.next.as_str(), NEXT);
    assert_eq!(event.sequence, 42);
    assert_eq!(event.message, payload);

    assert_eq!(message.summary.height, 9085);
    assert_eq!(message.summary.number_of_block_update, 1);
    assert_eq!(message.summary.event_sequence, 42);

    let artifact = message.to_base64_url();
    let decoded = URL_SAFE.decode(&artifact).unwrap();
    assert_eq!(decoded, message.encode());
    assert_eq!(RelayMessage::decode(&decoded).unwrap(), message);
}

#[tokio::test]
async fn test_notification_without_matches() {
    let header = make_test_header(50);
    let mut chain = MockSourceChain::default();
    let hash = chain
        .insert_block(&header.serialized, vec![0x01], vec![0x02])
        .unwrap();
    let service = make_service(chain);

    let notification = make_notification(&hash, 50, &[]);
    let (update, receipts) = service.handle_notification(&notification).await.unwrap();
    assert!(receipts.is_empty());

    let message = service.assemble(&[update], &receipts, None).unwrap();
    assert!(message.receipt_proofs.is_empty());
    assert_eq!(message.summary.number_of_event, 0);
}

#[tokio::test]
async fn test_block_proof_attached() {
    let service = make_service(MockSourceChain::default());
    let block_proof = BlockProof {
        header: make_test_header(3).serialized,
        block_witness: BlockWitness {
            height: 10,
            witness: vec![vec![0x07; 32]],
        },
    };

    let message = service
        .assemble(&[], &[], Some(block_proof.encode()))
        .unwrap();
    let decoded = RelayMessage::decode(&message.encode()).unwrap();
    let proof = BlockProof::decode(decoded.block_proof.as_deref().unwrap()).unwrap();
    assert_eq!(proof, block_proof);
}

#[tokio::test]
async fn test_integrity_failure_aborts_relay() {
    let header = make_test_header(12);
    let mut chain = MockSourceChain::default();
    chain
        .insert_block(&header.serialized, vec![], vec![])
        .unwrap();
    let monitor = MockBlockMonitor {
        notifications: vec![make_notification(&[0x99; 32], 12, &[])],
        ..Default::default()
    };
    let service = make_service(chain);

    let err = service.run_streaming(&monitor).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Integrity);
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn prop_corrupted_header_is_integrity_error(
        offset in any::<prop::sample::Index>(),
        flip in 1u8..=255,
    ) {
        let header = make_test_header(9085);
        let mut chain = MockSourceChain::default();
        let hash = chain
            .insert_block(&header.serialized, vec![0x01], vec![0x02])
            .unwrap();

        let raw = chain.headers.get_mut(&9085).unwrap();
        let i = offset.index(raw.len());
        raw[i] ^= flip;

        let service = make_service(chain);
        let notification = make_notification(&hash, 9085, &[]);
        let result = runtime().block_on(service.build_block_update(&notification));

        match result {
            Err(err @ RelayError::BlockHashMismatch { .. }) => {
                prop_assert_eq!(err.kind(), ErrorKind::Integrity);
            }
            other => prop_assert!(false, "expected hash mismatch, got {:?}", other),
        }
    }

    #[test]
    fn prop_relay_message_roundtrip(
        heights in prop::collection::vec(1i64..1_000_000, 0..4),
        sequences in prop::collection::vec(any::<i64>(), 0..4),
        messages in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..4),
        block_proof in prop::option::of(prop::collection::vec(any::<u8>(), 1..64)),
    ) {
        let service = make_service(MockSourceChain::default());
        let updates: Vec<BlockUpdate> = heights
            .iter()
            .map(|h| {
                let header = make_test_header(*h);
                BlockUpdate {
                    height: *h,
                    block_hash: header.hash().to_vec(),
                    proof: BlockUpdateEnvelope {
                        block_header: header.serialized.clone(),
                        votes: vec![0xAA; 4],
                        validators: vec![0xBB; 4],
                    }
                    .encode(),
                    header: header.serialized,
                }
            })
            .collect();

        let log_count = sequences.len().min(messages.len());
        let receipts: Vec<ReceiptProof> = (0..log_count)
            .map(|i| {
                let log = make_message_log(NEXT, &sequences[i].to_be_bytes(), &messages[i]);
                let event = btp_relay::extract(&log).unwrap();
                ReceiptProof {
                    index: i as i64,
                    proof: vec![0xc0],
                    event_proofs: vec![btp_relay::EventProof { index: 0, proof: vec![0xc1, 0x80] }],
                    events: vec![event],
                }
            })
            .collect();

        let message = service.assemble(&updates, &receipts, block_proof).unwrap();
        let decoded = RelayMessage::decode(&message.encode()).unwrap();
        prop_assert_eq!(&decoded, &message);
        if let Some(first) = sequences.first().filter(|_| log_count > 0) {
            prop_assert_eq!(decoded.summary.event_sequence, *first);
        }
    }
}
