//! # Relay Configuration
//!
//! Explicit configuration passed into the service and adapters at startup.

use crate::domain::{BlockRequest, BtpAddress, EventFilter, HexInt, EVENT_SIGNATURE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default JSON-RPC endpoint of the source chain node.
pub const DEFAULT_ENDPOINT: &str = "http://goloop.linhnc.info/api/v3/icondao";

/// Default BMC contract on the source chain.
pub const DEFAULT_SOURCE_CONTRACT: &str = "cx7a0c2dd9751e592ac4fbd6c70bd5ec574ebf198a";

/// Default destination BMC.
pub const DEFAULT_DESTINATION: &str = "btp://0x8.pra/0x5CC307268a1393AB9A764A20DACE848AB8275c46";

/// Suffix of the block monitor endpoint.
const BLOCK_MONITOR_PATH: &str = "/block";

/// Configuration rejected by [`RelayConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Endpoint is empty or not http(s).
    #[error("Invalid endpoint: {0:?}")]
    InvalidEndpoint(String),

    /// Destination has no protocol part.
    #[error("Invalid destination address: {0:?}")]
    InvalidDestination(String),

    /// Batch size of zero.
    #[error("max_block_updates must be at least 1")]
    ZeroBatchSize,
}

/// Relay configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// JSON-RPC endpoint of the source chain node.
    pub endpoint: String,

    /// Contract emitting the relayed events.
    pub source_contract: String,

    /// Destination BMC; matched against `Indexed[1]` of the events.
    pub destination: BtpAddress,

    /// Signature of the relayed event.
    pub event_signature: String,

    /// First height to subscribe from.
    pub start_height: i64,

    /// Block updates per relay message.
    pub max_block_updates: usize,

    /// Timeout for one JSON-RPC request, in seconds.
    pub request_timeout_secs: u64,

    /// Notifications buffered between the socket reader and the service.
    pub notification_buffer: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            source_contract: DEFAULT_SOURCE_CONTRACT.to_string(),
            destination: BtpAddress::new(DEFAULT_DESTINATION),
            event_signature: EVENT_SIGNATURE.to_string(),
            start_height: 10,
            max_block_updates: 2,
            request_timeout_secs: 30,
            notification_buffer: 64,
        }
    }
}

impl RelayConfig {
    /// Create a config for testing (local endpoint, single-block batches).
    pub fn for_testing() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9080/api/v3".to_string(),
            start_height: 1,
            max_block_updates: 1,
            request_timeout_secs: 5,
            notification_buffer: 8,
            ..Self::default()
        }
    }

    /// Block monitor URL: scheme switched to ws(s), `/block` appended.
    pub fn websocket_url(&self) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let url = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", url, BLOCK_MONITOR_PATH)
    }

    /// Subscription request for blocks from `height` carrying our events.
    pub fn block_request(&self, height: i64) -> BlockRequest {
        BlockRequest {
            height: HexInt::from_i64(height),
            event_filters: vec![EventFilter {
                addr: Some(self.source_contract.clone()),
                signature: self.event_signature.clone(),
                indexed: vec![Some(self.destination.to_string())],
                data: vec![],
            }],
        }
    }

    /// Reject configurations the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(ConfigError::InvalidEndpoint(self.endpoint.clone()));
        }
        if self.destination.protocol().is_empty() {
            return Err(ConfigError::InvalidDestination(self.destination.to_string()));
        }
        if self.max_block_updates == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        Ok(())
    }
}
