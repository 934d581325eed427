//! # BTP Relay Message Builder
//!
//! Builds verifiable relay messages from a source chain for a destination
//! chain's on-chain verifier.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Given a notification that a block contains matching events:
//! - fetch the block header, votes and next validator set, and anchor them
//!   to the notified block hash
//! - fetch an inclusion proof per matching event and decode the event from
//!   the proof leaf
//! - encode everything into one canonical relay message
//!
//! ## Integrity
//!
//! | Check | Failure |
//! |-------|---------|
//! | SHA3-256(header bytes) == notified hash | `BlockHashMismatch`, build aborted |
//! | Proof nodes linked root to leaf | `ProofStructure` |
//! | One event proof per decoded event | `EventShape` |
//! | Block updates in height order | `OutOfOrder` |
//!
//! ## Module Structure
//!
//! ```text
//! btp-relay/
//! ├── domain/          # Addresses, notification, header, proofs, relay message, errors
//! ├── algorithms/      # RLP codec, SHA3, MPT leaf resolution, event decoding
//! ├── ports/           # RelayApi (inbound) + SourceChainClient, BlockMonitor (outbound)
//! ├── application/     # RelayService, RelayBatch
//! ├── adapters/        # JSON-RPC client, WebSocket block monitor
//! └── config.rs        # RelayConfig
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod test_utils;

// Re-exports
pub use adapters::{IconRpcClient, WsBlockMonitor};
pub use algorithms::{decode_leaf, decode_sequence, extract, resolve_leaf, sha3_256, MptLeaf};
pub use application::{RelayBatch, RelayService};
pub use config::{ConfigError, RelayConfig};
pub use domain::{
    invariant_block_hash_matches, invariant_receipt_proof_aligned, parse_address, BlockHeader,
    BlockNotification, BlockProof, BlockRequest, BlockUpdate, BlockUpdateEnvelope, BlockWitness,
    BtpAddress, ChainAddress, ErrorKind, Event, EventFilter, EventLog, EventProof, Hash, HexBytes,
    HexInt, ReceiptProof, RelayError, RelayMessage, RelaySummary, EVENT_SIGNATURE,
};
pub use ports::{
    BlockMonitor, BlockSubscription, MockBlockMonitor, MockSourceChain, MonitorEvent, RelayApi,
    SourceChainClient,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    #[allow(clippy::const_is_empty)]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
