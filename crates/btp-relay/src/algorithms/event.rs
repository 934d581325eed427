//! # Event Extractor
//!
//! Maps a decoded `Message(str,int,bytes)` event log to a relayed [`Event`].

use crate::domain::{
    BtpAddress, Event, EventLog, RelayError, EVENT_DATA_MESSAGE, EVENT_INDEX_NEXT,
    EVENT_INDEX_SEQUENCE,
};

/// Extract the relayed event from an event log.
///
/// Deterministic: the result depends only on `log`.
pub fn extract(log: &EventLog) -> Result<Event, RelayError> {
    if log.indexed.len() <= EVENT_INDEX_SEQUENCE {
        return Err(RelayError::EventShape(format!(
            "expected at least {} indexed fields, got {}",
            EVENT_INDEX_SEQUENCE + 1,
            log.indexed.len()
        )));
    }
    let message = log
        .data
        .get(EVENT_DATA_MESSAGE)
        .ok_or_else(|| RelayError::EventShape("event has no data fields".into()))?;

    let next = std::str::from_utf8(&log.indexed[EVENT_INDEX_NEXT])
        .map_err(|e| RelayError::EventShape(format!("next address is not UTF-8: {}", e)))?;

    Ok(Event {
        next: BtpAddress::new(next),
        sequence: decode_sequence(&log.indexed[EVENT_INDEX_SEQUENCE]),
        message: message.clone(),
    })
}

/// Decode a big-endian unsigned sequence number.
///
/// Leading zero bytes are ignored. Only the low 8 bytes are kept and are
/// reinterpreted as `i64`, so values above `i64::MAX` come out negative.
pub fn decode_sequence(bytes: &[u8]) -> i64 {
    let start = bytes.len().saturating_sub(8);
    bytes[start..]
        .iter()
        .fold(0u64, |acc, b| (acc << 8) | u64::from(*b)) as i64
}
