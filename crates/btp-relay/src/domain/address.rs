//! # BTP Address
//!
//! Compact chain address notation: `proto://network.chain/contract`.
//!
//! Parsing is permissive. Missing structure yields empty components rather
//! than an error, so partially specified addresses can still be carried
//! around. Callers that need a well-formed address check
//! [`ChainAddress::is_complete`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Protocol/network separator.
const PROTOCOL_SEPARATOR: &str = "://";

/// A BTP address as it appears in configuration and on the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BtpAddress(String);

/// Components derived from a [`BtpAddress`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainAddress {
    /// Protocol, e.g. `btp`.
    pub protocol: String,
    /// Network id, e.g. `0x8`.
    pub network_id: String,
    /// Blockchain id, e.g. `pra`.
    pub blockchain: String,
    /// Contract address.
    pub contract: String,
}

impl ChainAddress {
    /// True when every component is present.
    pub fn is_complete(&self) -> bool {
        !self.protocol.is_empty()
            && !self.blockchain.is_empty()
            && !self.contract.is_empty()
    }
}

/// Parse an address string into its components.
pub fn parse_address(addr: &str) -> ChainAddress {
    let address = BtpAddress::new(addr);
    let (network_id, blockchain) = address.network();
    ChainAddress {
        protocol: address.protocol().to_string(),
        network_id: network_id.to_string(),
        blockchain: blockchain.to_string(),
        contract: address.contract_address().to_string(),
    }
}

impl BtpAddress {
    /// Wrap an address string.
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    /// Raw address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse into components.
    pub fn parse(&self) -> ChainAddress {
        parse_address(&self.0)
    }

    /// Protocol part, empty when there is no `://` after the first character.
    pub fn protocol(&self) -> &str {
        match self.0.find(PROTOCOL_SEPARATOR) {
            Some(i) if i > 0 => &self.0[..i],
            _ => "",
        }
    }

    /// The `network.chain` segment.
    pub fn network_address(&self) -> &str {
        self.segment(2)
    }

    /// Network id, empty when the network address has a single part.
    pub fn network_id(&self) -> &str {
        self.network().0
    }

    /// Blockchain id.
    pub fn blockchain(&self) -> &str {
        self.network().1
    }

    /// Contract address segment.
    pub fn contract_address(&self) -> &str {
        self.segment(3)
    }

    fn segment(&self, index: usize) -> &str {
        if self.protocol().is_empty() {
            return "";
        }
        self.0.split('/').nth(index).unwrap_or("")
    }

    fn network(&self) -> (&str, &str) {
        let network_address = self.network_address();
        if network_address.is_empty() {
            return ("", "");
        }
        let mut parts = network_address.split('.');
        match (parts.next(), parts.next()) {
            (Some(network_id), Some(blockchain)) => (network_id, blockchain),
            (Some(blockchain), None) => ("", blockchain),
            _ => ("", ""),
        }
    }
}

impl fmt::Display for BtpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BtpAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for BtpAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
