//! Typed read access to the top-level fields of a serialized object.

use super::field::{sti, FieldCode};
use super::parser::{header_length, is_variable_length, FieldScanner};
use crate::ledger::{AccountId, Hash256};
use crate::memory::{be_u16, be_u32, be_u64};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Located<'a> {
    /// Everything after the header; VL fields keep their length prefix.
    value: &'a [u8],
    payload: &'a [u8],
}

/// Index over one object's top-level fields. Construction fails unless the
/// buffer is a well formed sequence of fields with nothing left over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectView<'a> {
    bytes: &'a [u8],
    fields: BTreeMap<FieldCode, Located<'a>>,
}

impl<'a> ObjectView<'a> {
    pub fn parse(bytes: &'a [u8]) -> Option<Self> {
        let mut scanner = FieldScanner::new(bytes);
        let mut fields = BTreeMap::new();
        for item in scanner.by_ref() {
            let (at, span) = item.ok()?;
            let field = bytes.get(at..at + span.total_len)?;
            let payload = field.get(span.payload_start..span.payload_end())?;
            let value = if is_variable_length(span.code.type_code) {
                field.get(header_length(field[0])..span.payload_end())?
            } else {
                payload
            };
            fields.entry(span.code).or_insert(Located { value, payload });
        }
        if !scanner.consumed_exactly() || fields.is_empty() {
            return None;
        }
        Some(Self { bytes, fields })
    }

    pub fn bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn contains(&self, code: FieldCode) -> bool {
        self.fields.contains_key(&code)
    }

    /// Field contents without header or length prefix.
    pub fn payload(&self, code: FieldCode) -> Option<&'a [u8]> {
        self.fields.get(&code).map(|f| f.payload)
    }

    /// Field contents as a guest sees them: length prefix kept for blobs.
    pub fn value(&self, code: FieldCode) -> Option<&'a [u8]> {
        self.fields.get(&code).map(|f| f.value)
    }

    pub fn u16(&self, code: FieldCode) -> Option<u16> {
        be_u16(self.payload(code)?)
    }

    pub fn u32(&self, code: FieldCode) -> Option<u32> {
        be_u32(self.payload(code)?)
    }

    pub fn u64(&self, code: FieldCode) -> Option<u64> {
        be_u64(self.payload(code)?)
    }

    pub fn h256(&self, code: FieldCode) -> Option<Hash256> {
        self.payload(code)?.try_into().ok()
    }

    pub fn account(&self, code: FieldCode) -> Option<AccountId> {
        self.payload(code)?.try_into().ok()
    }

    /// Drops of a native amount field. `None` for issued amounts.
    pub fn native_drops(&self, code: FieldCode) -> Option<u64> {
        let raw = self.u64(code)?;
        if raw >> 63 != 0 {
            return None;
        }
        Some(raw & 0x3FFF_FFFF_FFFF_FFFF)
    }

    /// Nested object field, parsed.
    pub fn object(&self, code: FieldCode) -> Option<ObjectView<'a>> {
        if code.type_code != sti::OBJECT {
            return None;
        }
        ObjectView::parse(self.payload(code)?)
    }

    /// Elements of an array field, each as `(element field, contents)`.
    pub fn array(&self, code: FieldCode) -> Option<Vec<(FieldCode, ObjectView<'a>)>> {
        if code.type_code != sti::ARRAY {
            return None;
        }
        let payload = self.payload(code)?;
        let mut out = Vec::new();
        for item in FieldScanner::new(payload) {
            let (at, span) = item.ok()?;
            let inner = payload.get(at + span.payload_start..at + span.payload_end())?;
            out.push((span.code, ObjectView::parse(inner)?));
        }
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sto::{sf, ObjectBuilder};

    #[test]
    fn test_typed_getters() {
        let bytes = ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 3)
            .u32(sf::SEQUENCE, 9)
            .drops(sf::FEE, 12)
            .account(sf::ACCOUNT, &[4; 20])
            .object(sf::EMIT_DETAILS, ObjectBuilder::new().u32(sf::EMIT_GENERATION, 2))
            .build();
        let view = ObjectView::parse(&bytes).unwrap();
        assert_eq!(view.u16(sf::TRANSACTION_TYPE), Some(3));
        assert_eq!(view.u32(sf::SEQUENCE), Some(9));
        assert_eq!(view.native_drops(sf::FEE), Some(12));
        assert_eq!(view.account(sf::ACCOUNT), Some([4; 20]));
        assert_eq!(view.value(sf::ACCOUNT).unwrap().len(), 21);
        let details = view.object(sf::EMIT_DETAILS).unwrap();
        assert_eq!(details.u32(sf::EMIT_GENERATION), Some(2));
        assert!(!view.contains(sf::FLAGS));
    }

    #[test]
    fn test_trailing_garbage_rejected() {
        let mut bytes = ObjectBuilder::new().u32(sf::SEQUENCE, 9).build();
        bytes.push(0x24);
        assert!(ObjectView::parse(&bytes).is_none());
        assert!(ObjectView::parse(&[]).is_none());
    }

    #[test]
    fn test_array_elements() {
        let param = |name: &[u8]| {
            (
                sf::HOOK_PARAMETER,
                ObjectBuilder::new().vl(sf::HOOK_PARAMETER_NAME, name),
            )
        };
        let bytes = ObjectBuilder::new()
            .array(sf::HOOK_PARAMETERS, vec![param(&b"a"[..]), param(&b"bc"[..])])
            .build();
        let view = ObjectView::parse(&bytes).unwrap();
        let params = view.array(sf::HOOK_PARAMETERS).unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].0, sf::HOOK_PARAMETER);
        assert_eq!(params[1].1.payload(sf::HOOK_PARAMETER_NAME), Some(&b"bc"[..]));
    }
}
