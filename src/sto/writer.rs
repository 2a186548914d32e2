//! Serializer for the binary object format.
//!
//! Fields are kept sorted by [`FieldCode`] so the output is always in
//! canonical order regardless of the order they were added in.

use super::field::{FieldCode, ARRAY_END, OBJECT_END};
use std::collections::BTreeMap;

/// Largest length the three-tier VL prefix can express.
pub const MAX_VL_LENGTH: usize = 918_744;

/// Append the variable-length prefix for `len`. Lengths beyond
/// [`MAX_VL_LENGTH`] are clamped.
pub fn encode_vl_length(len: usize, out: &mut Vec<u8>) {
    let len = len.min(MAX_VL_LENGTH);
    if len <= 192 {
        out.push(len as u8);
    } else if len <= 12_480 {
        let rest = len - 193;
        out.push(193 + (rest >> 8) as u8);
        out.push((rest & 0xFF) as u8);
    } else {
        let rest = len - 12_481;
        out.push(241 + (rest >> 16) as u8);
        out.push(((rest >> 8) & 0xFF) as u8);
        out.push((rest & 0xFF) as u8);
    }
}

/// Encoding of a positive native amount in drops.
pub fn native_amount(drops: u64) -> [u8; 8] {
    (0x4000_0000_0000_0000 | (drops & 0x3FFF_FFFF_FFFF_FFFF)).to_be_bytes()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectBuilder {
    fields: BTreeMap<FieldCode, Vec<u8>>,
}

impl ObjectBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(mut self, code: FieldCode, payload: &[u8]) -> Self {
        let mut encoded = code.header();
        encoded.extend_from_slice(payload);
        self.fields.insert(code, encoded);
        self
    }

    pub fn u8(self, code: FieldCode, value: u8) -> Self {
        self.put(code, &[value])
    }

    pub fn u16(self, code: FieldCode, value: u16) -> Self {
        self.put(code, &value.to_be_bytes())
    }

    pub fn u32(self, code: FieldCode, value: u32) -> Self {
        self.put(code, &value.to_be_bytes())
    }

    pub fn u64(self, code: FieldCode, value: u64) -> Self {
        self.put(code, &value.to_be_bytes())
    }

    pub fn h160(self, code: FieldCode, value: &[u8; 20]) -> Self {
        self.put(code, value)
    }

    pub fn h256(self, code: FieldCode, value: &[u8; 32]) -> Self {
        self.put(code, value)
    }

    pub fn drops(self, code: FieldCode, drops: u64) -> Self {
        self.put(code, &native_amount(drops))
    }

    /// An amount already in wire form (8 or 48 bytes).
    pub fn amount_raw(self, code: FieldCode, bytes: &[u8]) -> Self {
        self.put(code, bytes)
    }

    pub fn vl(self, code: FieldCode, value: &[u8]) -> Self {
        let mut payload = Vec::with_capacity(value.len() + 3);
        encode_vl_length(value.len(), &mut payload);
        payload.extend_from_slice(value);
        self.put(code, &payload)
    }

    pub fn account(self, code: FieldCode, account: &[u8; 20]) -> Self {
        self.vl(code, account)
    }

    pub fn object(self, code: FieldCode, inner: ObjectBuilder) -> Self {
        let mut payload = inner.build();
        payload.push(OBJECT_END);
        self.put(code, &payload)
    }

    /// An array of wrapped objects, each tagged with its own field code.
    pub fn array(self, code: FieldCode, elements: Vec<(FieldCode, ObjectBuilder)>) -> Self {
        let mut payload = Vec::new();
        for (element_code, inner) in elements {
            element_code.write_header(&mut payload);
            payload.extend(inner.build());
            payload.push(OBJECT_END);
        }
        payload.push(ARRAY_END);
        self.put(code, &payload)
    }

    pub fn remove(mut self, code: FieldCode) -> Self {
        self.fields.remove(&code);
        self
    }

    pub fn contains(&self, code: FieldCode) -> bool {
        self.fields.contains_key(&code)
    }

    /// Concatenated fields, without an enclosing header or end marker.
    pub fn build(&self) -> Vec<u8> {
        self.fields.values().flatten().copied().collect()
    }
}
