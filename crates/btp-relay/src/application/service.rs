//! # Relay Service
//!
//! Application service building relay messages from block notifications.
//!
//! ## Pipeline
//!
//! ```text
//! BlockNotification ──┬──> build_block_update ───┐
//!                     └──> build_receipt_proofs ─┴──> RelayBatch ──> assemble ──> RelayMessage
//! ```
//!
//! Both builders only read from the source chain and share no state, so one
//! notification runs them concurrently. Notifications themselves are handled
//! one at a time in height order.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::batch::RelayBatch;
use crate::algorithms::{decode_leaf, extract, rlp};
use crate::config::RelayConfig;
use crate::domain::{
    invariant_block_hash_matches, invariant_receipt_proof_aligned, BlockHeader, BlockNotification,
    BlockUpdate, BlockUpdateEnvelope, EventProof, ReceiptProof, RelayError, RelayMessage,
    RelaySummary,
};
use crate::ports::{BlockMonitor, BlockSubscription, MonitorEvent, RelayApi, SourceChainClient};

/// Relay Service - turns block notifications into relay messages.
pub struct RelayService<C: SourceChainClient> {
    /// Configuration.
    config: RelayConfig,
    /// Source chain RPC.
    client: Arc<C>,
}

impl<C: SourceChainClient + 'static> RelayService<C> {
    /// Create a new relay service.
    pub fn new(config: RelayConfig, client: Arc<C>) -> Self {
        Self { config, client }
    }

    /// Get config.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Start an empty batch sized by the config.
    pub fn new_batch(&self) -> RelayBatch {
        RelayBatch::new(self.config.max_block_updates)
    }

    /// Internal: fetch and decode the proofs of one transaction's events.
    async fn build_receipt_proof(
        &self,
        block_hash: &[u8],
        index: i64,
        events: &[i64],
    ) -> Result<ReceiptProof, RelayError> {
        let proofs = self
            .client
            .get_proof_for_events(block_hash, index, events)
            .await?;

        let Some((receipt_path, event_paths)) = proofs.split_first() else {
            return Err(RelayError::ProofStructure(format!(
                "no receipt proof for transaction {}",
                index
            )));
        };
        if event_paths.len() != events.len() {
            return Err(RelayError::ProofStructure(format!(
                "transaction {}: requested {} event proofs, got {}",
                index,
                events.len(),
                event_paths.len()
            )));
        }

        let mut receipt = ReceiptProof {
            index,
            proof: rlp::encode_bytes_list(receipt_path),
            event_proofs: Vec::with_capacity(events.len()),
            events: Vec::with_capacity(events.len()),
        };
        for (event_index, path) in events.iter().zip(event_paths) {
            let log = decode_leaf(path)?;
            let event = extract(&log)?;
            debug!(
                "[btp-relay] Event tx={} idx={} seq={} next={}",
                index, event_index, event.sequence, event.next
            );
            receipt.event_proofs.push(EventProof {
                index: *event_index,
                proof: rlp::encode_bytes_list(path),
            });
            receipt.events.push(event);
        }

        invariant_receipt_proof_aligned(&receipt)?;
        Ok(receipt)
    }

    /// Turn a complete (or final) batch into a relay message.
    pub fn finish_batch(&self, batch: RelayBatch) -> Result<RelayMessage, RelayError> {
        let summary = batch.summary();
        let (updates, receipts) = batch.into_parts();
        let message = self.assemble(&updates, &receipts, None)?;
        debug_assert_eq!(message.summary, summary);
        Ok(message)
    }

    /// Streaming trigger: follow the live subscription from the configured
    /// start height until one batch is complete, then close it.
    pub async fn run_streaming<M>(&self, monitor: &M) -> Result<RelayMessage, RelayError>
    where
        M: BlockMonitor + ?Sized,
    {
        let request = self.config.block_request(self.config.start_height);
        let mut subscription = monitor.subscribe(request).await?;
        let mut batch = self.new_batch();

        loop {
            let Some(notification) = next_notification(&mut subscription).await? else {
                return Err(RelayError::Subscription(
                    "subscription ended before the batch was complete".into(),
                ));
            };
            let (update, receipts) = self.handle_notification(&notification).await?;
            batch.push(update, receipts)?;
            if batch.is_complete() {
                break;
            }
        }

        subscription.close();
        let message = self.finish_batch(batch)?;
        log_message(&message);
        Ok(message)
    }

    /// One-shot trigger: relay exactly the block at `height`.
    ///
    /// Notifications below `height` are skipped. A first notification past
    /// `height` means the block never matched and fails the lookup.
    pub async fn run_from_height<M>(
        &self,
        monitor: &M,
        height: i64,
    ) -> Result<RelayMessage, RelayError>
    where
        M: BlockMonitor + ?Sized,
    {
        let mut subscription = monitor.subscribe(self.config.block_request(height)).await?;
        let notification = loop {
            let Some(notification) = next_notification(&mut subscription).await? else {
                return Err(RelayError::Subscription(format!(
                    "no notification for height {}",
                    height
                )));
            };
            let notified = notification.block_height()?;
            if notified == height {
                break notification;
            }
            if notified > height {
                subscription.close();
                return Err(RelayError::Subscription(format!(
                    "asked for height {}, monitor moved on to {}",
                    height, notified
                )));
            }
            debug!(
                "[btp-relay] Skipping notification at {} before {}",
                notified, height
            );
        };
        subscription.close();

        let (update, receipts) = self.handle_notification(&notification).await?;
        let message = self.assemble(std::slice::from_ref(&update), &receipts, None)?;
        log_message(&message);
        Ok(message)
    }
}

#[async_trait]
impl<C: SourceChainClient + 'static> RelayApi for RelayService<C> {
    async fn build_block_update(
        &self,
        notification: &BlockNotification,
    ) -> Result<BlockUpdate, RelayError> {
        let height = notification.block_height()?;
        let block_hash = notification.block_hash()?;

        let raw_header = self.client.get_block_header_by_height(height).await?;
        if let Err(e) = invariant_block_hash_matches(height, &raw_header, &block_hash) {
            error!("[btp-relay] {}", e);
            return Err(e);
        }
        let header = BlockHeader::decode(&raw_header)?;

        let votes = self.client.get_votes_by_height(height).await?;
        let validators = self
            .client
            .get_data_by_hash(&header.next_validators_hash)
            .await?;

        let proof = BlockUpdateEnvelope {
            block_header: raw_header.clone(),
            votes,
            validators,
        }
        .encode();

        debug!(
            "[btp-relay] Block update at height {} ({} bytes)",
            height,
            proof.len()
        );
        Ok(BlockUpdate {
            height,
            block_hash,
            header: raw_header,
            proof,
        })
    }

    async fn build_receipt_proofs(
        &self,
        notification: &BlockNotification,
    ) -> Result<Vec<ReceiptProof>, RelayError> {
        if !notification.has_matches() {
            return Ok(Vec::new());
        }
        let block_hash = notification.block_hash()?;

        let matched = notification.matched_events()?;
        let mut receipts = Vec::with_capacity(matched.len());
        for (index, events) in &matched {
            receipts.push(self.build_receipt_proof(&block_hash, *index, events).await?);
        }
        Ok(receipts)
    }

    fn assemble(
        &self,
        updates: &[BlockUpdate],
        receipts: &[ReceiptProof],
        block_proof: Option<Vec<u8>>,
    ) -> Result<RelayMessage, RelayError> {
        let receipt_proofs = receipts
            .iter()
            .map(|r| invariant_receipt_proof_aligned(r).map(|_| r.encode()))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = RelaySummary::derive(updates, receipts);

        Ok(RelayMessage {
            block_updates: updates.iter().map(|u| u.proof.clone()).collect(),
            block_proof: block_proof.filter(|p| !p.is_empty()),
            receipt_proofs,
            summary,
        })
    }

    async fn handle_notification(
        &self,
        notification: &BlockNotification,
    ) -> Result<(BlockUpdate, Vec<ReceiptProof>), RelayError> {
        let (update, receipts) = tokio::try_join!(
            self.build_block_update(notification),
            self.build_receipt_proofs(notification)
        )?;
        info!(
            "[btp-relay] Notification height={} receipts={}",
            update.height,
            receipts.len()
        );
        Ok((update, receipts))
    }
}

/// Next notification, logging connect events. `None` once the stream ended.
async fn next_notification(
    subscription: &mut BlockSubscription,
) -> Result<Option<BlockNotification>, RelayError> {
    while let Some(event) = subscription.next_event().await {
        match event {
            MonitorEvent::Connected(peer) => {
                info!("[btp-relay] Block monitor connected: {}", peer);
            }
            MonitorEvent::Notification(n) => return Ok(Some(n)),
            MonitorEvent::Error(e) => {
                error!("[btp-relay] Block monitor error: {}", e);
                subscription.close();
                return Err(RelayError::Subscription(e));
            }
        }
    }
    Ok(None)
}

fn log_message(message: &RelayMessage) {
    info!(
        "[btp-relay] Relay message: height={} updates={} receipts={} events={} bytes={}",
        message.summary.height,
        message.block_updates.len(),
        message.receipt_proofs.len(),
        message.summary.number_of_event,
        message.encode().len()
    );
}
