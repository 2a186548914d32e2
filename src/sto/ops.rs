//! Locate, replace and remove fields inside serialized objects.
//!
//! Locators return `offset << 32 | length` so a guest can slice its own
//! buffer without a second call.

use super::parser::{field_length, FieldScanner};
use crate::api::{ApiError, ApiResult};
use tracing::debug;

/// Largest source object `emplace` accepts.
pub const MAX_EMPLACE_SOURCE: usize = 16 * 1024;
/// Largest field `emplace` accepts.
pub const MAX_EMPLACE_FIELD: usize = 4 * 1024;

const ARRAY_HEADER_NIBBLE: u8 = 0xF0;

pub fn pack_location(offset: usize, length: usize) -> i64 {
    ((offset as i64) << 32) | (length as i64 & 0xFFFF_FFFF)
}

/// Split a packed location back into `(offset, length)`.
pub fn unpack_location(packed: i64) -> (usize, usize) {
    ((packed >> 32) as usize, (packed & 0xFFFF_FFFF) as usize)
}

/// Find the first top-level field with `field_id`. Arrays are returned
/// whole (header through end marker); other fields as their bare payload.
pub fn subfield(buf: &[u8], field_id: u32) -> ApiResult<i64> {
    if buf.len() < 2 {
        return Err(ApiError::TooSmall);
    }
    let mut scanner = FieldScanner::new(buf);
    for item in scanner.by_ref() {
        let (at, span) = item.map_err(|_| ApiError::ParseError)?;
        if span.code.id() == field_id {
            return Ok(if span.is_array() {
                pack_location(at, span.total_len)
            } else {
                pack_location(at + span.payload_start, span.payload_len)
            });
        }
    }
    if scanner.offset() != buf.len() {
        return Err(ApiError::ParseError);
    }
    Err(ApiError::DoesntExist)
}

/// Find element `index` of an array. The buffer may be the array's own
/// encoding (leading `0xF?` header), in which case the header is skipped and
/// the trailing end marker ignored.
pub fn subarray(buf: &[u8], index: u32) -> ApiResult<i64> {
    if buf.len() < 2 {
        return Err(ApiError::TooSmall);
    }
    let (skip, body) = if buf[0] & 0xF0 == ARRAY_HEADER_NIBBLE {
        (1, &buf[1..buf.len() - 1])
    } else {
        (0, buf)
    };
    if body.is_empty() {
        return Err(ApiError::ParseError);
    }
    let mut scanner = FieldScanner::new(body);
    for (i, item) in scanner.by_ref().enumerate() {
        let (at, span) = item.map_err(|_| ApiError::ParseError)?;
        if i == index as usize {
            return Ok(pack_location(skip + at, span.total_len));
        }
    }
    if scanner.offset() != body.len() {
        return Err(ApiError::ParseError);
    }
    Err(ApiError::DoesntExist)
}

/// Insert `field` (a fully formed field, header included) at its canonical
/// position in `source`, replacing a field with the same id. `None` deletes.
pub fn emplace(source: &[u8], field: Option<&[u8]>, field_id: u32) -> ApiResult<Vec<u8>> {
    if source.len() > MAX_EMPLACE_SOURCE {
        return Err(ApiError::TooBig);
    }
    if source.len() < 2 {
        return Err(ApiError::TooSmall);
    }
    if let Some(field) = field {
        if field.len() > MAX_EMPLACE_FIELD {
            return Err(ApiError::TooBig);
        }
        if field.len() < 2 {
            return Err(ApiError::TooSmall);
        }
    }

    let end = source.len();
    let (mut inject_start, mut inject_end) = (end, end);
    let mut scanner = FieldScanner::new(source);
    let mut found = false;
    for item in scanner.by_ref() {
        let (at, span) = item.map_err(|_| ApiError::ParseError)?;
        let id = span.code.id();
        if id == field_id {
            inject_start = at;
            inject_end = at + span.total_len;
            found = true;
            break;
        }
        if id > field_id {
            inject_start = at;
            inject_end = at;
            found = true;
            break;
        }
    }
    if !found && scanner.offset() > end {
        return Err(ApiError::ParseError);
    }
    // a matched field can claim more bytes than the source holds
    let inject_end = inject_end.min(end);

    debug!(field_id, inject_start, inject_end, "sto emplace");
    let field = field.unwrap_or(&[]);
    let mut out = Vec::with_capacity(source.len() + field.len());
    out.extend_from_slice(&source[..inject_start]);
    out.extend_from_slice(field);
    out.extend_from_slice(&source[inject_end..]);
    Ok(out)
}

/// Remove `field_id` from `source`.
pub fn erase(source: &[u8], field_id: u32) -> ApiResult<Vec<u8>> {
    let out = emplace(source, None, field_id)?;
    if out.len() == source.len() {
        return Err(ApiError::DoesntExist);
    }
    Ok(out)
}

/// 1 when `buf` is a sequence of well formed fields that ends exactly at the
/// end of the buffer, otherwise 0.
pub fn validate(buf: &[u8]) -> ApiResult<i64> {
    if buf.len() < 2 {
        return Err(ApiError::TooSmall);
    }
    let mut scanner = FieldScanner::new(buf);
    for item in scanner.by_ref() {
        if item.is_err() {
            return Ok(0);
        }
    }
    Ok(if scanner.consumed_exactly() { 1 } else { 0 })
}

/// Number of elements in an array payload or fields in an object payload.
pub fn count_children(payload: &[u8]) -> Option<usize> {
    let mut scanner = FieldScanner::new(payload);
    let mut count = 0;
    for item in scanner.by_ref() {
        item.ok()?;
        count += 1;
    }
    scanner.consumed_exactly().then_some(count)
}

/// Total encoded length of the single field at the start of `buf`.
pub fn encoded_length(buf: &[u8]) -> Option<usize> {
    field_length(buf, 0).ok().map(|span| span.total_len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sto::field::sf;
    use crate::sto::writer::ObjectBuilder;
    use proptest::prelude::*;

    fn sample() -> Vec<u8> {
        ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 0)
            .u32(sf::SEQUENCE, 7)
            .account(sf::ACCOUNT, &[0x11; 20])
            .build()
    }

    #[test]
    fn test_subfield_returns_payload() {
        let buf = sample();
        let (offset, len) = unpack_location(subfield(&buf, sf::SEQUENCE.id()).unwrap());
        assert_eq!(len, 4);
        assert_eq!(&buf[offset..offset + len], &7u32.to_be_bytes());
    }

    #[test]
    fn test_subfield_missing_and_short() {
        let buf = sample();
        assert_eq!(subfield(&buf, sf::FLAGS.id()), Err(ApiError::DoesntExist));
        assert_eq!(subfield(&buf[..1], sf::FLAGS.id()), Err(ApiError::TooSmall));
        assert_eq!(subfield(&buf[..4], sf::FLAGS.id()), Err(ApiError::ParseError));
    }

    #[test]
    fn test_subfield_returns_whole_array() {
        let buf = ObjectBuilder::new()
            .u32(sf::SEQUENCE, 1)
            .array(
                sf::MEMOS,
                vec![(sf::MEMO, ObjectBuilder::new().vl(sf::HOOK_PARAMETER_NAME, b"a"))],
            )
            .build();
        let (offset, len) = unpack_location(subfield(&buf, sf::MEMOS.id()).unwrap());
        assert_eq!(buf[offset], 0xF9);
        assert_eq!(buf[offset + len - 1], 0xF1);
        assert_eq!(offset + len, buf.len());
    }

    #[test]
    fn test_subarray_unwraps_outer_array() {
        let element = ObjectBuilder::new().u32(sf::SEQUENCE, 3);
        let buf = ObjectBuilder::new()
            .array(sf::MEMOS, vec![(sf::MEMO, element.clone()), (sf::MEMO, element)])
            .build();
        let (offset, len) = unpack_location(subarray(&buf, 1).unwrap());
        assert_eq!(buf[offset], 0xEA);
        assert_eq!(buf[offset + len - 1], 0xE1);
        assert_eq!(subarray(&buf, 2), Err(ApiError::DoesntExist));
    }

    #[test]
    fn test_emplace_inserts_in_canonical_order() {
        let source = sample();
        let flags = ObjectBuilder::new().u32(sf::FLAGS, 0x8000_0000).build();
        let out = emplace(&source, Some(&flags), sf::FLAGS.id()).unwrap();
        let expected = ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 0)
            .u32(sf::FLAGS, 0x8000_0000)
            .u32(sf::SEQUENCE, 7)
            .account(sf::ACCOUNT, &[0x11; 20])
            .build();
        assert_eq!(out, expected);
    }

    #[test]
    fn test_emplace_replaces_existing() {
        let source = sample();
        let seq = ObjectBuilder::new().u32(sf::SEQUENCE, 9).build();
        let out = emplace(&source, Some(&seq), sf::SEQUENCE.id()).unwrap();
        assert_eq!(out.len(), source.len());
        let (offset, _) = unpack_location(subfield(&out, sf::SEQUENCE.id()).unwrap());
        assert_eq!(&out[offset..offset + 4], &9u32.to_be_bytes());
    }

    #[test]
    fn test_emplace_size_limits() {
        let source = sample();
        assert_eq!(emplace(&source, Some(&[0x24]), sf::SEQUENCE.id()), Err(ApiError::TooSmall));
        let huge = vec![0u8; MAX_EMPLACE_SOURCE + 1];
        assert_eq!(emplace(&huge, None, 1), Err(ApiError::TooBig));
    }

    #[test]
    fn test_erase() {
        let source = sample();
        let out = erase(&source, sf::SEQUENCE.id()).unwrap();
        assert_eq!(out.len(), source.len() - 5);
        assert_eq!(erase(&out, sf::SEQUENCE.id()), Err(ApiError::DoesntExist));
    }

    #[test]
    fn test_validate() {
        let mut buf = sample();
        assert_eq!(validate(&buf), Ok(1));
        buf.push(0x24);
        assert_eq!(validate(&buf), Ok(0));
        assert_eq!(validate(&[0x24]), Err(ApiError::TooSmall));
    }

    #[test]
    fn test_count_children() {
        assert_eq!(count_children(&sample()), Some(3));
        assert_eq!(count_children(&[0x24, 0]), None);
    }

    proptest! {
        #[test]
        fn prop_blob_fields_locate_exactly(
            sequence in any::<u32>(),
            blob in proptest::collection::vec(any::<u8>(), 1..1000),
        ) {
            let buf = ObjectBuilder::new()
                .u32(sf::SEQUENCE, sequence)
                .vl(sf::HOOK_STATE_DATA, &blob)
                .build();
            prop_assert_eq!(validate(&buf), Ok(1));
            prop_assert_eq!(count_children(&buf), Some(2));

            let (offset, len) = unpack_location(subfield(&buf, sf::HOOK_STATE_DATA.id()).unwrap());
            prop_assert_eq!(&buf[offset..offset + len], &blob[..]);

            prop_assert_eq!(validate(&buf[..buf.len() - 1]), Ok(0));
        }
    }
}
