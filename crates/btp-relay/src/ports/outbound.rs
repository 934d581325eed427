//! # Outbound Ports
//!
//! Traits for the source chain node: request/response RPC and the block
//! subscription stream.

use crate::algorithms::mpt::encode_leaf;
use crate::algorithms::rlp;
use crate::domain::{BlockHeader, BlockNotification, BlockRequest, EventLog, Hash, RelayError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

/// Source chain RPC - outbound port.
///
/// Errors are returned as produced; implementations do not retry.
#[async_trait]
pub trait SourceChainClient: Send + Sync {
    /// Serialized block header at `height`.
    async fn get_block_header_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError>;

    /// Serialized votes for the block at `height`.
    async fn get_votes_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError>;

    /// Data blob addressed by its hash (used for validator sets).
    async fn get_data_by_hash(&self, hash: &[u8]) -> Result<Vec<u8>, RelayError>;

    /// Inclusion proofs for a receipt and some of its events.
    ///
    /// Element 0 proves the receipt; element `k + 1` proves `events[k]`.
    /// Each proof is a node path, root first.
    async fn get_proof_for_events(
        &self,
        block_hash: &[u8],
        index: i64,
        events: &[i64],
    ) -> Result<Vec<Vec<Vec<u8>>>, RelayError>;
}

/// Item delivered by a block subscription.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorEvent {
    /// Subscription established (peer description).
    Connected(String),
    /// A block matched the request.
    Notification(BlockNotification),
    /// The stream failed; no more notifications follow.
    Error(String),
}

/// Live block subscription.
///
/// Notifications arrive one at a time in height order. Closing (or dropping)
/// the subscription is the only way to cancel it.
#[derive(Debug)]
pub struct BlockSubscription {
    events: mpsc::Receiver<MonitorEvent>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl BlockSubscription {
    /// Create a subscription and the handles its producer uses.
    pub fn channel(
        buffer: usize,
    ) -> (mpsc::Sender<MonitorEvent>, oneshot::Receiver<()>, Self) {
        let (event_tx, events) = mpsc::channel(buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        (
            event_tx,
            shutdown_rx,
            Self {
                events,
                shutdown: Some(shutdown_tx),
            },
        )
    }

    /// Next event, or `None` once the producer has finished.
    pub async fn next_event(&mut self) -> Option<MonitorEvent> {
        self.events.recv().await
    }

    /// Stop the subscription.
    pub fn close(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.events.close();
    }

    /// True once `close` was called.
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }
}

impl Drop for BlockSubscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Block monitor - outbound port.
#[async_trait]
pub trait BlockMonitor: Send + Sync {
    /// Open a subscription for blocks from `request.height` on.
    async fn subscribe(&self, request: BlockRequest) -> Result<BlockSubscription, RelayError>;
}

// =============================================================================
// Mock Implementations for Testing
// =============================================================================

/// In-memory source chain for testing.
#[derive(Default)]
pub struct MockSourceChain {
    /// Serialized headers by height.
    pub headers: HashMap<i64, Vec<u8>>,
    /// Serialized votes by height.
    pub votes: HashMap<i64, Vec<u8>>,
    /// Data blobs by hash.
    pub data: HashMap<Vec<u8>, Vec<u8>>,
    /// Receipt proofs by (block hash, tx index).
    pub receipt_proofs: HashMap<(Vec<u8>, i64), Vec<Vec<u8>>>,
    /// Event proofs by (block hash, tx index, event index).
    pub event_proofs: HashMap<(Vec<u8>, i64, i64), Vec<Vec<u8>>>,
    /// Fail vote lookups?
    pub fail_votes: bool,
    /// Cut every proof response down to this many paths.
    pub proof_limit: Option<usize>,
    /// Methods called, in order.
    pub calls: Mutex<Vec<String>>,
}

impl MockSourceChain {
    /// Register a block: header, votes and the validator set it points to.
    ///
    /// Returns the block hash.
    pub fn insert_block(
        &mut self,
        header: &[u8],
        votes: Vec<u8>,
        validators: Vec<u8>,
    ) -> Result<Hash, RelayError> {
        let decoded = BlockHeader::decode(header)?;
        self.headers.insert(decoded.height, header.to_vec());
        self.votes.insert(decoded.height, votes);
        self.data.insert(decoded.next_validators_hash.clone(), validators);
        Ok(decoded.hash())
    }

    /// Register one event of a transaction, with single-leaf proofs for the
    /// receipt and the event.
    pub fn insert_event(&mut self, block_hash: &[u8], index: i64, event_index: i64, log: &EventLog) {
        self.receipt_proofs
            .entry((block_hash.to_vec(), index))
            .or_insert_with(|| {
                let receipt = rlp::encode_list(&[rlp::encode_int(1)]);
                vec![encode_leaf(&rlp::encode_int(index), &receipt)]
            });
        self.event_proofs.insert(
            (block_hash.to_vec(), index, event_index),
            vec![encode_leaf(&rlp::encode_int(event_index), &log.encode())],
        );
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn missing(method: &str, what: String) -> RelayError {
        RelayError::transport(method, format!("{} not found", what))
    }
}

#[async_trait]
impl SourceChainClient for MockSourceChain {
    async fn get_block_header_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError> {
        self.record(format!("header:{}", height));
        self.headers
            .get(&height)
            .cloned()
            .ok_or_else(|| Self::missing("icx_getBlockHeaderByHeight", format!("header {}", height)))
    }

    async fn get_votes_by_height(&self, height: i64) -> Result<Vec<u8>, RelayError> {
        self.record(format!("votes:{}", height));
        if self.fail_votes {
            return Err(RelayError::transport("icx_getVotesByHeight", "Mock failure"));
        }
        self.votes
            .get(&height)
            .cloned()
            .ok_or_else(|| Self::missing("icx_getVotesByHeight", format!("votes {}", height)))
    }

    async fn get_data_by_hash(&self, hash: &[u8]) -> Result<Vec<u8>, RelayError> {
        self.record(format!("data:{}", hex::encode(hash)));
        self.data
            .get(hash)
            .cloned()
            .ok_or_else(|| Self::missing("icx_getDataByHash", format!("data 0x{}", hex::encode(hash))))
    }

    async fn get_proof_for_events(
        &self,
        block_hash: &[u8],
        index: i64,
        events: &[i64],
    ) -> Result<Vec<Vec<Vec<u8>>>, RelayError> {
        const METHOD: &str = "icx_getProofForEvents";
        self.record(format!("proof:{}:{:?}", index, events));

        let key = (block_hash.to_vec(), index);
        let mut proofs = vec![self
            .receipt_proofs
            .get(&key)
            .cloned()
            .ok_or_else(|| Self::missing(METHOD, format!("receipt {}", index)))?];
        for event in events {
            let proof = self
                .event_proofs
                .get(&(block_hash.to_vec(), index, *event))
                .cloned()
                .ok_or_else(|| Self::missing(METHOD, format!("event {}/{}", index, event)))?;
            proofs.push(proof);
        }
        if let Some(limit) = self.proof_limit {
            proofs.truncate(limit);
        }
        Ok(proofs)
    }
}

/// Block monitor replaying a fixed list of notifications.
#[derive(Default)]
pub struct MockBlockMonitor {
    /// Notifications in height order.
    pub notifications: Vec<BlockNotification>,
    /// Error delivered after the notifications, if any.
    pub trailing_error: Option<String>,
    /// Requests received.
    pub requests: Mutex<Vec<BlockRequest>>,
}

#[async_trait]
impl BlockMonitor for MockBlockMonitor {
    async fn subscribe(&self, request: BlockRequest) -> Result<BlockSubscription, RelayError> {
        let from = request.height.value()?;
        self.requests.lock().push(request);

        let (tx, _shutdown, subscription) =
            BlockSubscription::channel(self.notifications.len() + 2);
        let _ = tx.try_send(MonitorEvent::Connected("mock".into()));
        for n in &self.notifications {
            if n.block_height()? >= from {
                let _ = tx.try_send(MonitorEvent::Notification(n.clone()));
            }
        }
        if let Some(err) = &self.trailing_error {
            let _ = tx.try_send(MonitorEvent::Error(err.clone()));
        }
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{HexBytes, HexInt};

    fn notification(height: i64) -> BlockNotification {
        BlockNotification {
            hash: HexBytes::from_bytes(&[height as u8; 32]),
            height: HexInt::from_i64(height),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_source_chain_lookup() {
        let mut chain = MockSourceChain::default();
        chain.headers.insert(10, vec![0xc0]);
        assert_eq!(chain.get_block_header_by_height(10).await.unwrap(), vec![0xc0]);
        assert!(chain.get_block_header_by_height(11).await.is_err());
        assert_eq!(chain.calls.lock().as_slice(), ["header:10", "header:11"]);
    }

    #[tokio::test]
    async fn test_mock_source_chain_failure() {
        let chain = MockSourceChain {
            fail_votes: true,
            ..Default::default()
        };
        let err = chain.get_votes_by_height(1).await.unwrap_err();
        assert!(err.to_string().contains("icx_getVotesByHeight"));
    }

    #[tokio::test]
    async fn test_mock_monitor_filters_by_height() {
        let monitor = MockBlockMonitor {
            notifications: vec![notification(9), notification(10), notification(11)],
            ..Default::default()
        };
        let mut sub = monitor
            .subscribe(BlockRequest {
                height: HexInt::from_i64(10),
                event_filters: vec![],
            })
            .await
            .unwrap();

        assert_eq!(sub.next_event().await, Some(MonitorEvent::Connected("mock".into())));
        assert_eq!(
            sub.next_event().await,
            Some(MonitorEvent::Notification(notification(10)))
        );
        assert_eq!(
            sub.next_event().await,
            Some(MonitorEvent::Notification(notification(11)))
        );
        assert_eq!(sub.next_event().await, None);
    }

    #[tokio::test]
    async fn test_subscription_close_signals_producer() {
        let (_tx, mut shutdown, mut sub) = BlockSubscription::channel(4);
        assert!(!sub.is_closed());
        sub.close();
        assert!(sub.is_closed());
        assert!(shutdown.try_recv().is_ok());
    }
}
