//! # RLP Codec
//!
//! Canonical structured codec for relay envelopes.
//!
//! Standard RLP with two source-chain conventions:
//! - `0xF8 0x00` is a null item and decodes as an empty byte string or list
//! - integers are minimal two's complement big-endian, zero is `0x00`

use crate::domain::RelayError;

/// Encoded null item.
pub const NULL: [u8; 2] = [0xf8, 0x00];

/// Maximum list nesting accepted by the decoder.
pub const MAX_NESTING: usize = 32;

// =============================================================================
// DECODING
// =============================================================================

/// A decoded item borrowing from the input buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RlpItem<'a> {
    /// Byte string.
    Bytes(&'a [u8]),
    /// List of items.
    List(Vec<RlpItem<'a>>),
    /// Null marker.
    Null,
}

impl<'a> RlpItem<'a> {
    /// Byte string content; null reads as empty.
    pub fn as_bytes(&self) -> Result<&'a [u8], RelayError> {
        match self {
            RlpItem::Bytes(b) => Ok(*b),
            RlpItem::Null => Ok(&[]),
            RlpItem::List(_) => Err(RelayError::Serialization(
                "expected bytes, found list".into(),
            )),
        }
    }

    /// List content; null reads as empty.
    pub fn as_list(&self) -> Result<&[RlpItem<'a>], RelayError> {
        match self {
            RlpItem::List(items) => Ok(items.as_slice()),
            RlpItem::Null => Ok(&[]),
            RlpItem::Bytes(_) => Err(RelayError::Serialization(
                "expected list, found bytes".into(),
            )),
        }
    }

    /// Signed integer content.
    pub fn as_i64(&self) -> Result<i64, RelayError> {
        decode_int(self.as_bytes()?)
    }

    /// List of byte strings, copied out.
    pub fn as_bytes_list(&self) -> Result<Vec<Vec<u8>>, RelayError> {
        self.as_list()?
            .iter()
            .map(|item| item.as_bytes().map(<[u8]>::to_vec))
            .collect()
    }
}

/// Positional reader over the fields of a decoded record.
///
/// Fields beyond the ones read are ignored so newer producers can append
/// fields without breaking older readers.
#[derive(Debug)]
pub struct Fields<'i, 'a> {
    record: &'static str,
    items: &'i [RlpItem<'a>],
    next: usize,
}

impl<'i, 'a> Fields<'i, 'a> {
    /// Read the fields of `item`, which must be a list.
    pub fn new(record: &'static str, item: &'i RlpItem<'a>) -> Result<Self, RelayError> {
        let items = item
            .as_list()
            .map_err(|e| RelayError::Serialization(format!("{}: {}", record, e)))?;
        Ok(Self {
            record,
            items,
            next: 0,
        })
    }

    /// Next field as an item.
    pub fn item(&mut self) -> Result<&'i RlpItem<'a>, RelayError> {
        let item = self.items.get(self.next).ok_or_else(|| {
            RelayError::Serialization(format!("{}: missing field {}", self.record, self.next))
        })?;
        self.next += 1;
        Ok(item)
    }

    /// Next field as bytes.
    pub fn bytes(&mut self) -> Result<Vec<u8>, RelayError> {
        Ok(self.item()?.as_bytes()?.to_vec())
    }

    /// Next field as a signed integer.
    pub fn int(&mut self) -> Result<i64, RelayError> {
        self.item()?.as_i64()
    }

    /// Next field as a list of byte strings.
    pub fn bytes_list(&mut self) -> Result<Vec<Vec<u8>>, RelayError> {
        self.item()?.as_bytes_list()
    }
}

/// Decode a complete buffer into one item.
pub fn decode(data: &[u8]) -> Result<RlpItem<'_>, RelayError> {
    let (item, consumed) = decode_item(data, 0)?;
    if consumed != data.len() {
        return Err(RelayError::Serialization(format!(
            "trailing {} bytes after item",
            data.len() - consumed
        )));
    }
    Ok(item)
}

/// Decode a buffer that must hold a list.
pub fn decode_list(data: &[u8]) -> Result<Vec<RlpItem<'_>>, RelayError> {
    match decode(data)? {
        RlpItem::List(items) => Ok(items),
        RlpItem::Null => Ok(Vec::new()),
        RlpItem::Bytes(_) => Err(RelayError::Serialization(
            "expected list, found bytes".into(),
        )),
    }
}

/// Decode one item from the front of `data`, returning bytes consumed.
fn decode_item(data: &[u8], depth: usize) -> Result<(RlpItem<'_>, usize), RelayError> {
    if depth > MAX_NESTING {
        return Err(RelayError::Serialization(format!(
            "nesting deeper than {}",
            MAX_NESTING
        )));
    }
    let prefix = *data
        .first()
        .ok_or_else(|| RelayError::Serialization("unexpected end of input".into()))?;

    match prefix {
        0x00..=0x7f => Ok((RlpItem::Bytes(&data[..1]), 1)),
        0x80..=0xb7 => {
            let len = (prefix - 0x80) as usize;
            let payload = take(data, 1, len)?;
            Ok((RlpItem::Bytes(payload), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (prefix - 0xb7) as usize;
            let len = read_length(take(data, 1, len_of_len)?)?;
            let payload = take(data, 1 + len_of_len, len)?;
            Ok((RlpItem::Bytes(payload), 1 + len_of_len + len))
        }
        0xc0..=0xf7 => {
            let len = (prefix - 0xc0) as usize;
            let payload = take(data, 1, len)?;
            Ok((RlpItem::List(decode_items(payload, depth)?), 1 + len))
        }
        0xf8..=0xff => {
            if data.get(..2) == Some(&NULL[..]) {
                return Ok((RlpItem::Null, 2));
            }
            let len_of_len = (prefix - 0xf7) as usize;
            let len = read_length(take(data, 1, len_of_len)?)?;
            let payload = take(data, 1 + len_of_len, len)?;
            Ok((
                RlpItem::List(decode_items(payload, depth)?),
                1 + len_of_len + len,
            ))
        }
    }
}

fn decode_items(mut payload: &[u8], depth: usize) -> Result<Vec<RlpItem<'_>>, RelayError> {
    let mut items = Vec::new();
    while !payload.is_empty() {
        let (item, consumed) = decode_item(payload, depth + 1)?;
        items.push(item);
        payload = &payload[consumed..];
    }
    Ok(items)
}

/// Bounds-checked `data[offset..offset + len]`.
fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8], RelayError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| {
            RelayError::Serialization(format!(
                "item of {} bytes exceeds buffer of {}",
                len,
                data.len().saturating_sub(offset)
            ))
        })
}

fn read_length(bytes: &[u8]) -> Result<usize, RelayError> {
    if bytes.len() > std::mem::size_of::<usize>() {
        return Err(RelayError::Serialization("length prefix too long".into()));
    }
    Ok(bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize))
}

/// Decode a minimal two's complement big-endian integer.
pub fn decode_int(bytes: &[u8]) -> Result<i64, RelayError> {
    if bytes.is_empty() {
        return Ok(0);
    }
    if bytes.len() > 8 {
        return Err(RelayError::Serialization(format!(
            "integer of {} bytes does not fit in 64 bits",
            bytes.len()
        )));
    }
    let fill = if bytes[0] & 0x80 != 0 { 0xff } else { 0x00 };
    let mut buf = [fill; 8];
    buf[8 - bytes.len()..].copy_from_slice(bytes);
    Ok(i64::from_be_bytes(buf))
}

// =============================================================================
// ENCODING
// =============================================================================

/// Encode a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    if data.len() == 1 && data[0] < 0x80 {
        vec![data[0]]
    } else {
        let mut result = encode_header(0x80, data.len());
        result.extend_from_slice(data);
        result
    }
}

/// Encode a list from already-encoded items.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = items.iter().map(Vec::len).sum();
    let mut result = encode_header(0xc0, total_len);
    result.reserve(total_len);
    for item in items {
        result.extend_from_slice(item);
    }
    result
}

/// Encode a list of byte strings.
pub fn encode_bytes_list<T: AsRef<[u8]>>(items: &[T]) -> Vec<u8> {
    let encoded: Vec<Vec<u8>> = items.iter().map(|i| encode_bytes(i.as_ref())).collect();
    encode_list(&encoded)
}

/// Re-encode a decoded item in canonical form.
pub fn encode_item(item: &RlpItem<'_>) -> Vec<u8> {
    match item {
        RlpItem::Bytes(b) => encode_bytes(b),
        RlpItem::List(items) => {
            let encoded: Vec<Vec<u8>> = items.iter().map(encode_item).collect();
            encode_list(&encoded)
        }
        RlpItem::Null => NULL.to_vec(),
    }
}

/// Encode a signed integer.
pub fn encode_int(v: i64) -> Vec<u8> {
    encode_bytes(&int_to_bytes(v))
}

/// Minimal two's complement big-endian form of `v`.
pub fn int_to_bytes(v: i64) -> Vec<u8> {
    let bytes = v.to_be_bytes();
    let mut start = 0;
    while start < 7 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xff && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    bytes[start..].to_vec()
}

fn encode_header(offset: u8, len: usize) -> Vec<u8> {
    if len < 56 {
        vec![offset + len as u8]
    } else {
        let len_bytes = encode_length(len);
        let mut result = Vec::with_capacity(1 + len_bytes.len() + len);
        result.push(offset + 55 + len_bytes.len() as u8);
        result.extend_from_slice(&len_bytes);
        result
    }
}

/// Encode a length as minimal big-endian bytes.
fn encode_length(len: usize) -> Vec<u8> {
    let bytes = len.to_be_bytes();
    let start = bytes
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_match_reference_encoder() {
        for data in [
            vec![],
            vec![0x00],
            vec![0x7f],
            vec![0x80],
            b"dog".to_vec(),
            vec![0xAB; 55],
            vec![0xCD; 56],
            vec![0xEF; 1024],
        ] {
            assert_eq!(encode_bytes(&data), rlp::encode(&data).to_vec());
        }
    }

    #[test]
    fn test_list_matches_reference_encoder() {
        let items: Vec<Vec<u8>> = vec![b"cat".to_vec(), b"dog".to_vec(), vec![0x42; 70]];
        let mut stream = rlp::RlpStream::new_list(items.len());
        for item in &items {
            stream.append(item);
        }
        assert_eq!(encode_bytes_list(&items), stream.out().to_vec());
        assert_eq!(encode_list(&[]), vec![0xc0]);
    }

    #[test]
    fn test_decode_nested() {
        let inner = encode_bytes_list(&[b"a".to_vec(), b"bc".to_vec()]);
        let outer = encode_list(&[encode_bytes(b"head"), inner]);

        let items = decode_list(&outer).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_bytes().unwrap(), b"head");
        assert_eq!(
            items[1].as_bytes_list().unwrap(),
            vec![b"a".to_vec(), b"bc".to_vec()]
        );
    }

    #[test]
    fn test_null_reads_as_empty() {
        let encoded = encode_list(&[NULL.to_vec(), encode_bytes(b"x")]);
        let items = decode_list(&encoded).unwrap();
        assert_eq!(items[0], RlpItem::Null);
        assert!(items[0].as_bytes().unwrap().is_empty());
        assert!(items[0].as_list().unwrap().is_empty());
    }

    #[test]
    fn test_fields_reader() {
        let encoded = encode_list(&[
            encode_int(7),
            encode_bytes(b"abc"),
            encode_bytes_list(&[b"x".to_vec()]),
            encode_bytes(b"appended later"),
        ]);
        let item = decode(&encoded).unwrap();
        let mut fields = Fields::new("Record", &item).unwrap();
        assert_eq!(fields.int().unwrap(), 7);
        assert_eq!(fields.bytes().unwrap(), b"abc");
        assert_eq!(fields.bytes_list().unwrap(), vec![b"x".to_vec()]);

        let short = decode(&encoded[..0x01]).ok();
        assert!(short.is_none());

        let two = encode_list(&[encode_int(1)]);
        let item = decode(&two).unwrap();
        let mut fields = Fields::new("Record", &item).unwrap();
        fields.int().unwrap();
        let err = fields.bytes().unwrap_err();
        assert!(err.to_string().contains("Record: missing field 1"));
    }

    #[test]
    fn test_truncated_input_fails() {
        let encoded = encode_bytes(&[0x11; 60]);
        assert!(decode(&encoded[..30]).is_err());
        assert!(decode(&[]).is_err());
    }

    #[test]
    fn test_trailing_bytes_fail() {
        let mut encoded = encode_bytes(b"abc");
        encoded.push(0x01);
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn test_nesting_limit() {
        let mut encoded = encode_list(&[]);
        for _ in 0..(MAX_NESTING + 2) {
            encoded = encode_list(&[encoded]);
        }
        assert!(decode(&encoded).is_err());
    }

    #[test]
    fn test_int_encoding() {
        assert_eq!(int_to_bytes(0), vec![0x00]);
        assert_eq!(int_to_bytes(127), vec![0x7f]);
        assert_eq!(int_to_bytes(128), vec![0x00, 0x80]);
        assert_eq!(int_to_bytes(9085), vec![0x23, 0x7d]);
        assert_eq!(int_to_bytes(-1), vec![0xff]);
        assert_eq!(int_to_bytes(-129), vec![0xff, 0x7f]);
        assert_eq!(encode_int(0), vec![0x00]);
        assert_eq!(encode_int(128), vec![0x82, 0x00, 0x80]);
    }

    #[test]
    fn test_int_decoding() {
        for v in [0, 1, 127, 128, 255, 256, 9085, -1, -128, -129, i64::MAX, i64::MIN] {
            assert_eq!(decode_int(&int_to_bytes(v)).unwrap(), v);
        }
        assert_eq!(decode_int(&[]).unwrap(), 0);
        assert!(decode_int(&[0x01; 9]).is_err());
    }
}
