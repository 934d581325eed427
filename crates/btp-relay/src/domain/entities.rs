//! # Domain Entities
//!
//! Evidence records collected while building a relay message, and their
//! canonical encodings.
//!
//! Field order inside every record is part of the wire contract; the
//! destination verifier decodes positionally.

use super::address::BtpAddress;
use super::errors::{Hash, RelayError};
use super::value_objects::{HexBytes, HexInt};
use crate::algorithms::hashing::sha3_256;
use crate::algorithms::rlp::{self, Fields, RlpItem};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// NOTIFICATION
// =============================================================================

/// Signal from the block monitor that a block matched the event filters.
///
/// `indexes[f]` lists the transaction indexes matching filter `f`, and
/// `events[f][t]` lists the matching event indexes inside transaction
/// `indexes[f][t]`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockNotification {
    /// Block hash.
    pub hash: HexBytes,
    /// Block height.
    pub height: HexInt,
    /// Matching transaction indexes per filter.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<Vec<HexInt>>,
    /// Matching event indexes per filter and transaction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<Vec<Vec<HexInt>>>,
}

impl BlockNotification {
    /// Decoded block hash.
    pub fn block_hash(&self) -> Result<Vec<u8>, RelayError> {
        self.hash.value()
    }

    /// Decoded block height.
    pub fn block_height(&self) -> Result<i64, RelayError> {
        self.height.value()
    }

    /// True if any transaction matched.
    pub fn has_matches(&self) -> bool {
        self.indexes.iter().any(|l| !l.is_empty())
    }

    /// Matched event indexes per transaction, merged across all filters.
    ///
    /// Transactions come out in ascending index order, each once, with the
    /// union of its event indexes sorted ascending.
    pub fn matched_events(&self) -> Result<BTreeMap<i64, Vec<i64>>, RelayError> {
        let mut merged: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
        for (f, indexes) in self.indexes.iter().enumerate() {
            for (t, index) in indexes.iter().enumerate() {
                let events = self
                    .events
                    .get(f)
                    .and_then(|per_tx| per_tx.get(t))
                    .ok_or_else(|| {
                        RelayError::EventShape(format!(
                            "notification has no event list for filter {} transaction {}",
                            f, t
                        ))
                    })?;
                let entry = merged.entry(index.value()?).or_default();
                for event in events {
                    entry.insert(event.value()?);
                }
            }
        }
        Ok(merged
            .into_iter()
            .map(|(index, events)| (index, events.into_iter().collect()))
            .collect())
    }
}

// =============================================================================
// BLOCK HEADER
// =============================================================================

/// Source chain block header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockHeader {
    /// Header format version.
    pub version: i64,
    /// Block height.
    pub height: i64,
    /// Timestamp (microseconds).
    pub timestamp: i64,
    /// Proposer address.
    pub proposer: Vec<u8>,
    /// Previous block id.
    pub prev_id: Vec<u8>,
    /// Hash of the votes for the previous block.
    pub votes_hash: Vec<u8>,
    /// Hash of the validator set for the next block.
    pub next_validators_hash: Vec<u8>,
    /// Patch transaction root.
    pub patch_transactions_hash: Vec<u8>,
    /// Normal transaction root.
    pub normal_transactions_hash: Vec<u8>,
    /// Logs bloom.
    pub logs_bloom: Vec<u8>,
    /// Result hash.
    pub result: Vec<u8>,
    /// Bytes this header was decoded from.
    pub serialized: Vec<u8>,
}

impl BlockHeader {
    /// Decode raw header bytes, keeping them as `serialized`.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("BlockHeader", &item)?;
        Ok(Self {
            version: f.int()?,
            height: f.int()?,
            timestamp: f.int()?,
            proposer: f.bytes()?,
            prev_id: f.bytes()?,
            votes_hash: f.bytes()?,
            next_validators_hash: f.bytes()?,
            patch_transactions_hash: f.bytes()?,
            normal_transactions_hash: f.bytes()?,
            logs_bloom: f.bytes()?,
            result: f.bytes()?,
            serialized: raw.to_vec(),
        })
    }

    /// Height of a serialized header, reading only the leading
    /// `[version, height]` fields. Later fields may use any layout.
    pub fn peek_height(raw: &[u8]) -> Result<i64, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("BlockHeader", &item)?;
        f.item()?;
        f.int()
    }

    /// Encode the header fields (ignores `serialized`).
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_int(self.version),
            rlp::encode_int(self.height),
            rlp::encode_int(self.timestamp),
            rlp::encode_bytes(&self.proposer),
            rlp::encode_bytes(&self.prev_id),
            rlp::encode_bytes(&self.votes_hash),
            rlp::encode_bytes(&self.next_validators_hash),
            rlp::encode_bytes(&self.patch_transactions_hash),
            rlp::encode_bytes(&self.normal_transactions_hash),
            rlp::encode_bytes(&self.logs_bloom),
            rlp::encode_bytes(&self.result),
        ])
    }

    /// Block hash: SHA3-256 of the serialized header.
    pub fn hash(&self) -> Hash {
        sha3_256(&self.serialized)
    }
}

// =============================================================================
// EVENTS
// =============================================================================

/// Event log decoded from a proof leaf.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventLog {
    /// Emitting contract address.
    pub addr: Vec<u8>,
    /// Indexed fields; `indexed[0]` is the signature.
    pub indexed: Vec<Vec<u8>>,
    /// Data fields.
    pub data: Vec<Vec<u8>>,
}

impl EventLog {
    /// Decode from leaf bytes.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("EventLog", &item)?;
        Ok(Self {
            addr: f.bytes()?,
            indexed: f.bytes_list()?,
            data: f.bytes_list()?,
        })
    }

    /// Encode.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_bytes(&self.addr),
            rlp::encode_bytes_list(&self.indexed),
            rlp::encode_bytes_list(&self.data),
        ])
    }
}

/// Relayed event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
    /// Next hop.
    pub next: BtpAddress,
    /// Per-destination sequence number.
    pub sequence: i64,
    /// Opaque message payload.
    pub message: Vec<u8>,
}

impl Event {
    fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_bytes(self.next.as_str().as_bytes()),
            rlp::encode_int(self.sequence),
            rlp::encode_bytes(&self.message),
        ])
    }

    fn from_item(item: &RlpItem<'_>) -> Result<Self, RelayError> {
        let mut f = Fields::new("Event", item)?;
        let next = String::from_utf8(f.bytes()?)
            .map_err(|e| RelayError::Serialization(format!("Event.Next: {}", e)))?;
        Ok(Self {
            next: BtpAddress::new(next),
            sequence: f.int()?,
            message: f.bytes()?,
        })
    }
}

/// Inclusion proof of one event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EventProof {
    /// Event index inside the receipt.
    pub index: i64,
    /// Encoded node path.
    pub proof: Vec<u8>,
}

impl EventProof {
    fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[rlp::encode_int(self.index), rlp::encode_bytes(&self.proof)])
    }

    fn from_item(item: &RlpItem<'_>) -> Result<Self, RelayError> {
        let mut f = Fields::new("EventProof", item)?;
        Ok(Self {
            index: f.int()?,
            proof: f.bytes()?,
        })
    }
}

/// Proof bundle for one transaction's matching events.
///
/// `event_proofs[i]` proves `events[i]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReceiptProof {
    /// Transaction index inside the block.
    pub index: i64,
    /// Encoded node path of the receipt.
    pub proof: Vec<u8>,
    /// Per-event proofs.
    pub event_proofs: Vec<EventProof>,
    /// Decoded events.
    pub events: Vec<Event>,
}

impl ReceiptProof {
    /// Encode.
    pub fn encode(&self) -> Vec<u8> {
        let event_proofs: Vec<Vec<u8>> = self.event_proofs.iter().map(EventProof::encode).collect();
        let events: Vec<Vec<u8>> = self.events.iter().map(Event::encode).collect();
        rlp::encode_list(&[
            rlp::encode_int(self.index),
            rlp::encode_bytes(&self.proof),
            rlp::encode_list(&event_proofs),
            rlp::encode_list(&events),
        ])
    }

    /// Decode.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("ReceiptProof", &item)?;
        let index = f.int()?;
        let proof = f.bytes()?;
        let event_proofs = f
            .item()?
            .as_list()?
            .iter()
            .map(EventProof::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        let events = f
            .item()?
            .as_list()?
            .iter()
            .map(Event::from_item)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            index,
            proof,
            event_proofs,
            events,
        })
    }
}

// =============================================================================
// BLOCK UPDATE / BLOCK PROOF
// =============================================================================

/// Header, votes and next validators of one block, as relayed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockUpdateEnvelope {
    /// Serialized block header.
    pub block_header: Vec<u8>,
    /// Serialized votes.
    pub votes: Vec<u8>,
    /// Serialized next validator set.
    pub validators: Vec<u8>,
}

impl BlockUpdateEnvelope {
    /// Encode.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_bytes(&self.block_header),
            rlp::encode_bytes(&self.votes),
            rlp::encode_bytes(&self.validators),
        ])
    }

    /// Decode.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("BlockUpdate", &item)?;
        Ok(Self {
            block_header: f.bytes()?,
            votes: f.bytes()?,
            validators: f.bytes()?,
        })
    }
}

/// A built block update. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockUpdate {
    /// Block height.
    pub height: i64,
    /// Block hash.
    pub block_hash: Vec<u8>,
    /// Serialized header.
    pub header: Vec<u8>,
    /// Encoded [`BlockUpdateEnvelope`].
    pub proof: Vec<u8>,
}

/// Witness of a block against an accumulator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockWitness {
    /// Accumulator height.
    pub height: i64,
    /// Witness hashes.
    pub witness: Vec<Vec<u8>>,
}

/// Proof that a past block belongs to the chain.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockProof {
    /// Serialized header.
    pub header: Vec<u8>,
    /// Accumulator witness.
    pub block_witness: BlockWitness,
}

impl BlockProof {
    /// Encode.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_bytes(&self.header),
            rlp::encode_list(&[
                rlp::encode_int(self.block_witness.height),
                rlp::encode_bytes_list(&self.block_witness.witness),
            ]),
        ])
    }

    /// Decode.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("BlockProof", &item)?;
        let header = f.bytes()?;
        let mut w = Fields::new("BlockWitness", f.item()?)?;
        Ok(Self {
            header,
            block_witness: BlockWitness {
                height: w.int()?,
                witness: w.bytes_list()?,
            },
        })
    }
}

// =============================================================================
// RELAY MESSAGE
// =============================================================================

/// Bookkeeping about a relay message. Not on the wire; derivable from it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RelaySummary {
    /// Height of the last block update (0 if none).
    pub height: i64,
    /// Number of block updates.
    pub number_of_block_update: usize,
    /// Sequence of the first relayed event (0 if none).
    pub event_sequence: i64,
    /// Number of relayed events.
    pub number_of_event: usize,
}

impl RelaySummary {
    /// Bookkeeping for `block_updates` and `receipts`, in relay order.
    pub fn derive(block_updates: &[BlockUpdate], receipts: &[ReceiptProof]) -> Self {
        Self::from_heights(
            block_updates.last().map(|u| u.height),
            block_updates.len(),
            receipts,
        )
    }

    /// Recompute the bookkeeping from wire records.
    ///
    /// Envelopes stay opaque apart from the height at the head of the last
    /// one's header.
    pub fn from_wire(
        block_updates: &[Vec<u8>],
        receipts: &[ReceiptProof],
    ) -> Result<Self, RelayError> {
        let height = match block_updates.last() {
            Some(last) => {
                let envelope = BlockUpdateEnvelope::decode(last)?;
                Some(BlockHeader::peek_height(&envelope.block_header)?)
            }
            None => None,
        };
        Ok(Self::from_heights(height, block_updates.len(), receipts))
    }

    fn from_heights(height: Option<i64>, updates: usize, receipts: &[ReceiptProof]) -> Self {
        RelaySummary {
            height: height.unwrap_or_default(),
            number_of_block_update: updates,
            event_sequence: receipts
                .iter()
                .flat_map(|r| r.events.first())
                .next()
                .map_or(0, |e| e.sequence),
            number_of_event: receipts.iter().map(|r| r.events.len()).sum(),
        }
    }
}

/// Final relay artifact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RelayMessage {
    /// Encoded [`BlockUpdateEnvelope`]s in height order.
    pub block_updates: Vec<Vec<u8>>,
    /// Encoded [`BlockProof`], if any.
    pub block_proof: Option<Vec<u8>>,
    /// Encoded [`ReceiptProof`]s in block and transaction order.
    pub receipt_proofs: Vec<Vec<u8>>,
    /// Bookkeeping.
    pub summary: RelaySummary,
}

impl RelayMessage {
    /// Encode for the destination chain.
    pub fn encode(&self) -> Vec<u8> {
        rlp::encode_list(&[
            rlp::encode_bytes_list(&self.block_updates),
            rlp::encode_bytes(self.block_proof.as_deref().unwrap_or_default()),
            rlp::encode_bytes_list(&self.receipt_proofs),
        ])
    }

    /// Decode and recompute the summary from the nested records.
    pub fn decode(raw: &[u8]) -> Result<Self, RelayError> {
        let item = rlp::decode(raw)?;
        let mut f = Fields::new("RelayMessage", &item)?;
        let block_updates = f.bytes_list()?;
        let block_proof = Some(f.bytes()?).filter(|p| !p.is_empty());
        let receipt_proofs = f.bytes_list()?;

        let receipts = receipt_proofs
            .iter()
            .map(|raw| ReceiptProof::decode(raw))
            .collect::<Result<Vec<_>, _>>()?;
        let summary = RelaySummary::from_wire(&block_updates, &receipts)?;

        Ok(Self {
            block_updates,
            block_proof,
            receipt_proofs,
            summary,
        })
    }

    /// URL-safe base64 of the encoded message.
    pub fn to_base64_url(&self) -> String {
        URL_SAFE.encode(self.encode())
    }
}
