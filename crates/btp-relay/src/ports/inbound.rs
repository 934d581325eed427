//! # Inbound Ports
//!
//! API trait defining what the relay pipeline can do.

use crate::domain::{BlockNotification, BlockUpdate, ReceiptProof, RelayError, RelayMessage};
use async_trait::async_trait;

/// Relay pipeline API - inbound port.
#[async_trait]
pub trait RelayApi: Send + Sync {
    /// Fetch and validate header, votes and next validators of the notified block.
    async fn build_block_update(
        &self,
        notification: &BlockNotification,
    ) -> Result<BlockUpdate, RelayError>;

    /// Fetch and decode the event proofs listed in the notification.
    ///
    /// One receipt proof per matched transaction, in ascending transaction
    /// index order, even when several filters matched it. A notification
    /// without index lists yields an empty list.
    async fn build_receipt_proofs(
        &self,
        notification: &BlockNotification,
    ) -> Result<Vec<ReceiptProof>, RelayError>;

    /// Compose the final message. Order of `updates` and `receipts` is kept
    /// and the update envelopes are relayed as opaque bytes.
    fn assemble(
        &self,
        updates: &[BlockUpdate],
        receipts: &[ReceiptProof],
        block_proof: Option<Vec<u8>>,
    ) -> Result<RelayMessage, RelayError>;

    /// Run both builders for one notification.
    async fn handle_notification(
        &self,
        notification: &BlockNotification,
    ) -> Result<(BlockUpdate, Vec<ReceiptProof>), RelayError>;
}
