//! # Relay Batch
//!
//! Accumulates block updates and receipt proofs across notifications until a
//! relay message is due.
//!
//! A batch is owned by the single context handling notifications. Batches
//! built concurrently each get their own instance.

use crate::domain::{BlockUpdate, ReceiptProof, RelayError, RelaySummary};

/// Evidence collected for one relay message.
#[derive(Debug)]
pub struct RelayBatch {
    max_block_updates: usize,
    updates: Vec<BlockUpdate>,
    receipts: Vec<ReceiptProof>,
    summary: RelaySummary,
}

impl RelayBatch {
    /// Create an empty batch closing after `max_block_updates` updates.
    pub fn new(max_block_updates: usize) -> Self {
        Self {
            max_block_updates: max_block_updates.max(1),
            updates: Vec::new(),
            receipts: Vec::new(),
            summary: RelaySummary::default(),
        }
    }

    /// Add the evidence built for one notification.
    ///
    /// Updates must arrive in strictly increasing height order.
    pub fn push(
        &mut self,
        update: BlockUpdate,
        receipts: Vec<ReceiptProof>,
    ) -> Result<(), RelayError> {
        if let Some(last) = self.updates.last() {
            if update.height <= last.height {
                return Err(RelayError::OutOfOrder {
                    previous: last.height,
                    height: update.height,
                });
            }
        }

        self.summary.height = update.height;
        self.summary.number_of_block_update += 1;
        for receipt in &receipts {
            if self.summary.number_of_event == 0 {
                if let Some(first) = receipt.events.first() {
                    self.summary.event_sequence = first.sequence;
                }
            }
            self.summary.number_of_event += receipt.events.len();
        }

        self.updates.push(update);
        self.receipts.extend(receipts);
        Ok(())
    }

    /// Due for relay: enough updates, or any receipt evidence.
    pub fn is_complete(&self) -> bool {
        self.updates.len() >= self.max_block_updates || !self.receipts.is_empty()
    }

    /// No updates yet?
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// Bookkeeping so far.
    pub fn summary(&self) -> RelaySummary {
        self.summary
    }

    /// Accumulated updates.
    pub fn updates(&self) -> &[BlockUpdate] {
        &self.updates
    }

    /// Accumulated receipt proofs.
    pub fn receipts(&self) -> &[ReceiptProof] {
        &self.receipts
    }

    /// Split into updates and receipt proofs.
    pub fn into_parts(self) -> (Vec<BlockUpdate>, Vec<ReceiptProof>) {
        (self.updates, self.receipts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BtpAddress, Event};

    fn update(height: i64) -> BlockUpdate {
        BlockUpdate {
            height,
            block_hash: vec![height as u8; 32],
            header: vec![0xc0],
            proof: vec![0xc1, height as u8],
        }
    }

    fn receipt(index: i64, sequences: &[i64]) -> ReceiptProof {
        ReceiptProof {
            index,
            events: sequences
                .iter()
                .map(|s| Event {
                    next: BtpAddress::new("btp://0x8.pra/0x5CC"),
                    sequence: *s,
                    message: vec![],
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_completes_on_update_count() {
        let mut batch = RelayBatch::new(2);
        assert!(batch.is_empty());
        batch.push(update(10), vec![]).unwrap();
        assert!(!batch.is_complete());
        batch.push(update(11), vec![]).unwrap();
        assert!(batch.is_complete());

        let summary = batch.summary();
        assert_eq!(summary, RelaySummary::derive(batch.updates(), batch.receipts()));
        assert_eq!(summary.height, 11);
        assert_eq!(summary.number_of_block_update, 2);
        assert_eq!(summary.number_of_event, 0);
    }

    #[test]
    fn test_completes_on_receipts() {
        let mut batch = RelayBatch::new(5);
        batch.push(update(10), vec![receipt(0, &[7, 8])]).unwrap();
        assert!(batch.is_complete());
        assert_eq!(batch.summary().event_sequence, 7);
        assert_eq!(batch.summary().number_of_event, 2);
    }

    #[test]
    fn test_rejects_out_of_order() {
        let mut batch = RelayBatch::new(3);
        batch.push(update(10), vec![]).unwrap();
        let err = batch.push(update(10), vec![]).unwrap_err();
        assert!(matches!(
            err,
            RelayError::OutOfOrder {
                previous: 10,
                height: 10
            }
        ));
        assert_eq!(batch.updates().len(), 1);
    }

    #[test]
    fn test_into_parts_keeps_order() {
        let mut batch = RelayBatch::new(3);
        batch.push(update(10), vec![receipt(2, &[])]).unwrap();
        batch.push(update(12), vec![receipt(0, &[]), receipt(1, &[])]).unwrap();
        let (updates, receipts) = batch.into_parts();
        let proofs: Vec<Vec<u8>> = updates.into_iter().map(|u| u.proof).collect();
        assert_eq!(proofs, vec![vec![0xc1, 10], vec![0xc1, 12]]);
        let indexes: Vec<i64> = receipts.iter().map(|r| r.index).collect();
        assert_eq!(indexes, vec![2, 0, 1]);
    }
}
