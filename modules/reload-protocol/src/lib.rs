//! Resource reload message encoding.
//!
//! The message is a protobuf `repeated string resources = 1;` written by hand:
//! per path one tag byte, a varint byte length, then the UTF-8 bytes. There is
//! no outer framing.

use thiserror::Error;

/// Field 1, wire type 2 (length delimited).
pub const RESOURCE_FIELD_TAG: u8 = 0x0A;

const MAX_VARINT_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("unexpected field tag 0x{tag:02x} at offset {offset}")]
    UnexpectedTag { tag: u8, offset: usize },
    #[error("truncated length varint at offset {0}")]
    TruncatedVarint(usize),
    #[error("length varint too long at offset {0}")]
    VarintOverflow(usize),
    #[error("resource path at offset {offset} needs {needed} bytes, {available} left")]
    TruncatedPayload { offset: usize, needed: u64, available: usize },
    #[error("resource path at offset {0} is not valid UTF-8")]
    InvalidUtf8(usize),
}

/// Append `value` as a base-128 varint, low group first.
pub fn encode_varint(mut value: u64, out: &mut Vec<u8>) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

fn read_varint(data: &[u8], start: usize) -> Result<(u64, usize), DecodeError> {
    let mut value = 0u64;
    for i in 0..MAX_VARINT_LEN {
        let Some(&b) = data.get(start + i) else {
            return Err(DecodeError::TruncatedVarint(start));
        };
        value |= u64::from(b & 0x7F) << (7 * i);
        if b & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(DecodeError::VarintOverflow(start))
}

/// Encode resource paths in the given order.
pub fn encode<I, S>(paths: I) -> Vec<u8>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = Vec::new();
    for p in paths {
        let bytes = p.as_ref().as_bytes();
        out.push(RESOURCE_FIELD_TAG);
        encode_varint(bytes.len() as u64, &mut out);
        out.extend_from_slice(bytes);
    }
    out
}

/// Read back the resource paths of an encoded message.
pub fn decode(data: &[u8]) -> Result<Vec<String>, DecodeError> {
    let mut paths = Vec::new();
    let mut i = 0usize;
    while i < data.len() {
        if data[i] != RESOURCE_FIELD_TAG {
            return Err(DecodeError::UnexpectedTag { tag: data[i], offset: i });
        }
        let (len, used) = read_varint(data, i + 1)?;
        let start = i + 1 + used;
        let available = data.len() - start;
        if len > available as u64 {
            return Err(DecodeError::TruncatedPayload { offset: start, needed: len, available });
        }
        let end = start + len as usize;
        let s = std::str::from_utf8(&data[start..end]).map_err(|_| DecodeError::InvalidUtf8(start))?;
        paths.push(s.to_string());
        i = end;
    }
    Ok(paths)
}
