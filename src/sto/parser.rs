//! In-place length decoding for serialized ledger objects.
//!
//! The decoder never allocates. It reports where a field's payload starts
//! and how long the whole encoded field is so callers can walk a buffer one
//! field at a time. Fixed-width payloads are not checked against the end of
//! the buffer here; scanners detect overruns by comparing their final
//! position with the buffer length.

use super::field::{sti, FieldCode, ARRAY_END, OBJECT_END};
use thiserror::Error;

/// Containers nested deeper than this are rejected.
pub const MAX_DEPTH: u32 = 10;
/// Upper bound on children of one container and on fields visited by a scan.
pub const MAX_CHILDREN: usize = 1024;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("unexpected end of buffer")]
    UnexpectedEnd,
    #[error("unknown type code in header")]
    UnknownTypeEarly,
    #[error("unknown type code")]
    UnknownTypeLate,
    #[error("nesting deeper than {MAX_DEPTH}")]
    ExcessiveNesting,
    #[error("more than {MAX_CHILDREN} children")]
    ExcessiveSize,
}

/// Location of one encoded field relative to the start of its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpan {
    pub code: FieldCode,
    pub payload_start: usize,
    pub payload_len: usize,
    /// Header, payload and (for containers) the end marker.
    pub total_len: usize,
}

impl FieldSpan {
    pub fn is_object(&self) -> bool {
        self.code.type_code == sti::OBJECT
    }

    pub fn is_array(&self) -> bool {
        self.code.type_code == sti::ARRAY
    }

    pub fn payload_end(&self) -> usize {
        self.payload_start + self.payload_len
    }
}

/// Bytes taken by a field header starting with `first`.
pub(crate) fn header_length(first: u8) -> usize {
    match (first >> 4, first & 0x0F) {
        (0, 0) => 3,
        (0, _) | (_, 0) => 2,
        _ => 1,
    }
}

pub(crate) fn is_variable_length(type_code: u16) -> bool {
    matches!(type_code, sti::VL | sti::ACCOUNT | sti::PATHSET | sti::VECTOR256)
}

fn fixed_width(type_code: u16) -> Option<usize> {
    match type_code {
        sti::UINT16 => Some(2),
        sti::UINT32 => Some(4),
        sti::UINT64 => Some(8),
        sti::UINT128 => Some(16),
        sti::UINT256 => Some(32),
        sti::UINT8 => Some(1),
        sti::UINT160 => Some(20),
        _ => None,
    }
}

/// Decode the field starting at `buf[0]`.
pub fn field_length(buf: &[u8], depth: u32) -> Result<FieldSpan, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::ExcessiveNesting);
    }
    let end = buf.len();
    let first = *buf.first().ok_or(ParseError::UnexpectedEnd)?;
    let (high, low) = ((first >> 4) as u16, (first & 0x0F) as u16);
    let mut upto = 1usize;
    if upto >= end {
        return Err(ParseError::UnexpectedEnd);
    }

    let (type_code, field) = if high > 0 && low > 0 {
        (high, low)
    } else if high > 0 {
        upto += 1;
        (high, buf[upto - 1] as u16)
    } else if low > 0 {
        upto += 1;
        (buf[upto - 1] as u16, low)
    } else {
        let t = buf[upto] as u16;
        upto += 1;
        if upto >= end {
            return Err(ParseError::UnexpectedEnd);
        }
        let f = buf[upto] as u16;
        upto += 1;
        (t, f)
    };
    if upto >= end {
        return Err(ParseError::UnexpectedEnd);
    }
    if !(1..=19).contains(&type_code) || (9..=13).contains(&type_code) {
        return Err(ParseError::UnknownTypeEarly);
    }
    let code = FieldCode::new(type_code, field);

    let length = if is_variable_length(type_code) {
        let b1 = buf[upto] as usize;
        upto += 1;
        if upto >= end {
            return Err(ParseError::UnexpectedEnd);
        }
        if b1 < 193 {
            Some(b1)
        } else if b1 < 241 {
            let b2 = buf[upto] as usize;
            upto += 1;
            Some((b1 - 193) * 256 + b2 + 193)
        } else {
            let b2 = buf[upto] as usize;
            upto += 1;
            if upto >= end {
                return Err(ParseError::UnexpectedEnd);
            }
            let b3 = buf[upto] as usize;
            upto += 1;
            if upto >= end {
                return Err(ParseError::UnexpectedEnd);
            }
            Some((b1 - 241) * 65536 + 12481 + b2 * 256 + b3)
        }
    } else if let Some(width) = fixed_width(type_code) {
        Some(width)
    } else if type_code == sti::AMOUNT {
        // top bits 01: positive native drops
        Some(if buf[upto] >> 6 == 1 { 8 } else { 48 })
    } else {
        None
    };

    if let Some(length) = length {
        return Ok(FieldSpan {
            code,
            payload_start: upto,
            payload_len: length,
            total_len: upto + length,
        });
    }

    if type_code == sti::OBJECT || type_code == sti::ARRAY {
        let payload_start = upto;
        let marker = if type_code == sti::OBJECT { OBJECT_END } else { ARRAY_END };
        for _ in 0..MAX_CHILDREN {
            let child = field_length(&buf[upto..], depth + 1)
                .map_err(|_| ParseError::UnexpectedEnd)?;
            upto += child.total_len;
            if upto >= end {
                return Err(ParseError::UnexpectedEnd);
            }
            if buf[upto] == marker {
                return Ok(FieldSpan {
                    code,
                    payload_start,
                    payload_len: upto - payload_start,
                    total_len: upto + 1,
                });
            }
        }
        return Err(ParseError::ExcessiveSize);
    }

    Err(ParseError::UnknownTypeLate)
}

/// Walks consecutive top-level fields of a buffer, stopping after
/// [`MAX_CHILDREN`] fields or at the end of the buffer.
pub struct FieldScanner<'a> {
    buf: &'a [u8],
    offset: usize,
    visited: usize,
    failed: bool,
}

impl<'a> FieldScanner<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            offset: 0,
            visited: 0,
            failed: false,
        }
    }

    /// Offset of the next field. May exceed the buffer length when the last
    /// field claimed more bytes than were present.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// True when the scan stopped exactly at the end of the buffer.
    pub fn consumed_exactly(&self) -> bool {
        !self.failed && self.offset == self.buf.len()
    }
}

impl<'a> Iterator for FieldScanner<'a> {
    /// `(offset of header, span)`
    type Item = Result<(usize, FieldSpan), ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.visited >= MAX_CHILDREN || self.offset >= self.buf.len() {
            return None;
        }
        self.visited += 1;
        match field_length(&self.buf[self.offset..], 0) {
            Ok(span) => {
                let at = self.offset;
                self.offset += span.total_len;
                Some(Ok((at, span)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sto::field::sf;

    #[test]
    fn test_fixed_width_field() {
        let buf = [0x24, 0x00, 0x00, 0x00, 0x05, 0xFF];
        let span = field_length(&buf, 0).unwrap();
        assert_eq!(span.code, sf::SEQUENCE);
        assert_eq!(span.payload_start, 1);
        assert_eq!(span.payload_len, 4);
        assert_eq!(span.total_len, 5);
    }

    #[test]
    fn test_uncommon_field_header() {
        // LastLedgerSequence: type 2, field 27
        let buf = [0x20, 0x1B, 0, 0, 0, 9];
        let span = field_length(&buf, 0).unwrap();
        assert_eq!(span.code, sf::LAST_LEDGER_SEQUENCE);
        assert_eq!(span.payload_start, 2);
        assert_eq!(span.total_len, 6);
    }

    #[test]
    fn test_variable_length_tiers() {
        let mut buf = vec![0x73, 0x03, 1, 2, 3, 0];
        assert_eq!(field_length(&buf, 0).unwrap().payload_len, 3);

        // 300 bytes: 193 + ((300 - 193) >> 8), (300 - 193) & 0xff
        buf = vec![0x75, 193, 107];
        buf.extend(vec![0u8; 300]);
        let span = field_length(&buf, 0).unwrap();
        assert_eq!(span.payload_start, 3);
        assert_eq!(span.payload_len, 300);
    }

    #[test]
    fn test_native_and_issued_amounts() {
        let native = [0x61, 0x40, 0, 0, 0, 0, 0, 0, 10, 0];
        assert_eq!(field_length(&native, 0).unwrap().payload_len, 8);
        let issued = [0x61, 0xD4, 0];
        assert_eq!(field_length(&issued, 0).unwrap().payload_len, 48);
    }

    #[test]
    fn test_object_with_end_marker() {
        // EmitDetails { EmitGeneration = 1 } E1
        let buf = [0xED, 0x20, 0x2E, 0, 0, 0, 1, 0xE1];
        let span = field_length(&buf, 0).unwrap();
        assert!(span.is_object());
        assert_eq!(span.payload_start, 1);
        assert_eq!(span.payload_len, 6);
        assert_eq!(span.total_len, 8);
    }

    #[test]
    fn test_truncated_object() {
        let buf = [0xED, 0x20, 0x2E, 0, 0, 0, 1];
        assert_eq!(field_length(&buf, 0), Err(ParseError::UnexpectedEnd));
    }

    #[test]
    fn test_unknown_type() {
        let buf = [0x91, 0x00, 0x00];
        assert_eq!(field_length(&buf, 0), Err(ParseError::UnknownTypeEarly));
    }

    #[test]
    fn test_depth_limit() {
        assert_eq!(field_length(&[0x24, 0], 11), Err(ParseError::ExcessiveNesting));
    }

    #[test]
    fn test_scanner_reports_overrun() {
        let buf = [0x24, 0, 0];
        let mut scanner = FieldScanner::new(&buf);
        assert!(scanner.next().unwrap().is_ok());
        assert!(scanner.next().is_none());
        assert_eq!(scanner.offset(), 5);
        assert!(!scanner.consumed_exactly());
    }
}
