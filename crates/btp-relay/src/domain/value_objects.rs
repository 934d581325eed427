//! # Domain Value Objects
//!
//! Hex-string wrappers used at the JSON-RPC boundary and the subscription
//! request types.
//!
//! Every integer or byte string crossing the RPC boundary goes through
//! [`HexInt`] or [`HexBytes`]; nothing else formats or parses `0x` strings.

use super::errors::RelayError;
use serde::{Deserialize, Serialize};
use std::fmt;

const HEX_PREFIX: &str = "0x";

/// `0x`-prefixed hexadecimal integer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexInt(String);

impl HexInt {
    /// Encode an integer.
    pub fn from_i64(v: i64) -> Self {
        if v < 0 {
            Self(format!("-{}{:x}", HEX_PREFIX, v.unsigned_abs()))
        } else {
            Self(format!("{}{:x}", HEX_PREFIX, v))
        }
    }

    /// Wrap a raw string without validation.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the integer value.
    pub fn value(&self) -> Result<i64, RelayError> {
        let (negative, digits) = match self.0.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, self.0.as_str()),
        };
        let digits = digits.strip_prefix(HEX_PREFIX).ok_or_else(|| {
            RelayError::Serialization(format!("HexInt without 0x prefix: {:?}", self.0))
        })?;
        let magnitude = u64::from_str_radix(digits, 16)
            .map_err(|e| RelayError::Serialization(format!("HexInt {:?}: {}", self.0, e)))?;
        if negative {
            0i64.checked_sub_unsigned(magnitude)
        } else {
            i64::try_from(magnitude).ok()
        }
        .ok_or_else(|| RelayError::Serialization(format!("HexInt {:?} out of range", self.0)))
    }
}

impl From<i64> for HexInt {
    fn from(v: i64) -> Self {
        Self::from_i64(v)
    }
}

impl fmt::Display for HexInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// `0x`-prefixed hexadecimal byte string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HexBytes(String);

impl HexBytes {
    /// Encode bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(format!("{}{}", HEX_PREFIX, hex::encode(bytes)))
    }

    /// Wrap a raw string without validation.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Raw string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the bytes. An empty string decodes to no bytes.
    pub fn value(&self) -> Result<Vec<u8>, RelayError> {
        if self.0.is_empty() {
            return Ok(Vec::new());
        }
        let digits = self.0.strip_prefix(HEX_PREFIX).unwrap_or(&self.0);
        hex::decode(digits)
            .map_err(|e| RelayError::Serialization(format!("HexBytes {:?}: {}", self.0, e)))
    }
}

impl fmt::Display for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Event filter registered with the block subscription.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    /// Emitting contract.
    #[serde(rename = "addr", default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    /// Event signature, e.g. `Message(str,int,bytes)`.
    #[serde(rename = "event")]
    pub signature: String,
    /// Indexed field criteria, `None` matches anything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub indexed: Vec<Option<String>>,
    /// Data field criteria, `None` matches anything.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Option<String>>,
}

/// Subscription request sent to the block monitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRequest {
    /// First height to notify.
    pub height: HexInt,
    /// Event filters; notifications carry matches per filter.
    #[serde(rename = "eventFilters", default, skip_serializing_if = "Vec::is_empty")]
    pub event_filters: Vec<EventFilter>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_int_format() {
        assert_eq!(HexInt::from_i64(10).as_str(), "0xa");
        assert_eq!(HexInt::from_i64(0).as_str(), "0x0");
        assert_eq!(HexInt::from_i64(9085).as_str(), "0x237d");
        assert_eq!(HexInt::from_i64(-1).as_str(), "-0x1");
    }

    #[test]
    fn test_hex_int_value() {
        assert_eq!(HexInt::new("0x237d").value().unwrap(), 9085);
        assert_eq!(HexInt::new("-0x10").value().unwrap(), -16);
        assert_eq!(
            HexInt::from_i64(i64::MIN).value().unwrap(),
            i64::MIN
        );
        assert!(HexInt::new("237d").value().is_err());
        assert!(HexInt::new("0xzz").value().is_err());
        assert!(HexInt::new("0xffffffffffffffff").value().is_err());
    }

    #[test]
    fn test_hex_bytes() {
        let b = HexBytes::from_bytes(&[0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(b.as_str(), "0xdeadbeef");
        assert_eq!(b.value().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
        assert!(HexBytes::default().value().unwrap().is_empty());
        assert!(HexBytes::new("0xabc").value().is_err());
    }

    #[test]
    fn test_block_request_json() {
        let req = BlockRequest {
            height: HexInt::from_i64(10),
            event_filters: vec![EventFilter {
                addr: Some("cx7a0c".into()),
                signature: "Message(str,int,bytes)".into(),
                indexed: vec![Some("btp://0x8.pra/0x5CC".into())],
                data: vec![],
            }],
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["height"], "0xa");
        assert_eq!(json["eventFilters"][0]["addr"], "cx7a0c");
        assert_eq!(json["eventFilters"][0]["event"], "Message(str,int,bytes)");
        assert_eq!(json["eventFilters"][0]["indexed"][0], "btp://0x8.pra/0x5CC");
        assert!(json["eventFilters"][0].get("data").is_none());
    }
}
