//! # Domain Errors
//!
//! Error types for relay message construction.
//!
//! Every failure surfaces to the notification handler unchanged. Nothing in
//! this crate retries or suppresses an error; retry policy belongs to the
//! caller.

use thiserror::Error;

/// Hash type (32-byte SHA3-256).
pub type Hash = [u8; 32];

/// Coarse error classes used by callers to pick a reaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// RPC or network failure. The caller decides whether to retry.
    Transport,
    /// Fetched data does not match what the notification announced.
    Integrity,
    /// Malformed proof, leaf or event shape.
    Decode,
    /// Canonical codec failure (schema mismatch).
    Serialization,
}

/// Relay error types.
#[derive(Debug, Error)]
pub enum RelayError {
    /// A JSON-RPC call failed.
    #[error("RPC {method} failed: {reason}")]
    Transport {
        /// JSON-RPC method name
        method: String,
        /// Underlying failure
        reason: String,
    },

    /// The block subscription failed or was rejected.
    #[error("Block subscription error: {0}")]
    Subscription(String),

    /// Header bytes do not hash to the notified block hash.
    #[error("Block hash mismatch at height {height}: notified {expected}, computed {actual}")]
    BlockHashMismatch {
        /// Block height
        height: i64,
        /// Hash announced by the notification (hex)
        expected: String,
        /// Hash of the fetched header bytes (hex)
        actual: String,
    },

    /// A block update arrived at or below the height of the previous one.
    #[error("Block update out of order: height {height} after {previous}")]
    OutOfOrder {
        /// Height of the last accepted update
        previous: i64,
        /// Height of the rejected update
        height: i64,
    },

    /// The proof could not be parsed into a trie path.
    #[error("Invalid proof structure: {0}")]
    ProofStructure(String),

    /// The leaf payload is not an event log.
    #[error("Fail to parse EventLog on leaf: {0}")]
    EventLogDecode(String),

    /// The event log does not have the expected field layout.
    #[error("Unexpected event shape: {0}")]
    EventShape(String),

    /// Canonical encode/decode failure.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RelayError {
    /// Build a transport error for a JSON-RPC method.
    pub fn transport(method: &str, reason: impl ToString) -> Self {
        Self::Transport {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport { .. } | Self::Subscription(_) => ErrorKind::Transport,
            Self::BlockHashMismatch { .. } | Self::OutOfOrder { .. } => ErrorKind::Integrity,
            Self::ProofStructure(_) | Self::EventLogDecode(_) | Self::EventShape(_) => {
                ErrorKind::Decode
            }
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }
}
