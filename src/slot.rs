//! Slot table: numbered handles on serialized ledger objects.
//!
//! Objects loaded into slots are kept in an append-only arena for the life
//! of one hook invocation. A slot names an arena object plus a path of
//! selectors; the selected element is located by re-scanning the object
//! when the slot is used, so sub-slots share their parent's storage.

use crate::api::{ApiError, ApiResult};
use crate::sto::ops::count_children;
use crate::sto::parser::{header_length, is_variable_length};
use crate::sto::{sti, FieldCode, FieldScanner, FieldSpan};
use crate::xfl;
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

/// Field ids reported by `slot_type` for whole objects.
pub mod root {
    pub const TRANSACTION: u32 = (10001 << 16) | 257;
    pub const LEDGER_ENTRY: u32 = (10002 << 16) | 257;
    pub const METADATA: u32 = (10004 << 16) | 257;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector {
    Field(FieldCode),
    Index(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotEntry {
    object: usize,
    root_code: u32,
    path: Vec<Selector>,
}

/// The element a slot currently points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    pub field_id: u32,
    pub type_code: u16,
    /// What the guest receives from `slot`: the field without its header.
    pub value: &'a [u8],
    /// Contents used for navigation and amount decoding.
    pub payload: &'a [u8],
}

impl<'a> Element<'a> {
    fn root(bytes: &'a [u8], root_code: u32) -> Self {
        Self {
            field_id: root_code,
            type_code: sti::OBJECT,
            value: bytes,
            payload: bytes,
        }
    }

    fn from_span(region: &'a [u8], at: usize, span: &FieldSpan) -> Option<Self> {
        let field = region.get(at..at + span.total_len)?;
        let payload = field.get(span.payload_start..span.payload_end())?;
        let value = if is_variable_length(span.code.type_code) {
            field.get(header_length(field[0])..span.payload_end())?
        } else {
            payload
        };
        Some(Self {
            field_id: span.code.id(),
            type_code: span.code.type_code,
            value,
            payload,
        })
    }

    pub fn is_object(&self) -> bool {
        self.type_code == sti::OBJECT
    }

    pub fn is_array(&self) -> bool {
        self.type_code == sti::ARRAY
    }

    pub fn is_amount(&self) -> bool {
        self.type_code == sti::AMOUNT
    }

    fn field(&self, code: FieldCode) -> Option<Element<'a>> {
        for item in FieldScanner::new(self.payload) {
            let (at, span) = item.ok()?;
            if span.code == code {
                return Element::from_span(self.payload, at, &span);
            }
        }
        None
    }

    fn index(&self, index: u32) -> Option<Element<'a>> {
        let (at, span) = FieldScanner::new(self.payload)
            .nth(index as usize)?
            .ok()?;
        Element::from_span(self.payload, at, &span)
    }

    fn select(&self, selector: Selector) -> Option<Element<'a>> {
        match selector {
            Selector::Field(code) if self.is_object() => self.field(code),
            Selector::Index(i) if self.is_array() => self.index(i),
            _ => None,
        }
    }
}

pub struct SlotTable {
    max_slots: u32,
    objects: Vec<Vec<u8>>,
    slots: BTreeMap<u32, SlotEntry>,
    free: VecDeque<u32>,
    counter: u32,
}

impl SlotTable {
    pub fn new(max_slots: u32) -> Self {
        Self {
            max_slots,
            objects: Vec::new(),
            slots: BTreeMap::new(),
            free: VecDeque::new(),
            counter: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn no_free_slots(&self) -> bool {
        self.slots.len() as u64 >= self.max_slots as u64
    }

    fn allocate(&mut self) -> ApiResult<u32> {
        if let Some(slot) = self.free.pop_front() {
            return Ok(slot);
        }
        loop {
            self.counter = self.counter.saturating_add(1);
            if !self.slots.contains_key(&self.counter) || self.counter > self.max_slots {
                break;
            }
        }
        if self.counter > self.max_slots {
            return Err(ApiError::NoFreeSlots);
        }
        Ok(self.counter)
    }

    /// Whether `requested` (0 meaning "any") could receive an object.
    pub fn check_target(&self, requested: u32) -> ApiResult<()> {
        if requested > self.max_slots {
            return Err(ApiError::InvalidArgument);
        }
        if requested == 0 && self.no_free_slots() {
            return Err(ApiError::NoFreeSlots);
        }
        Ok(())
    }

    /// Validate an explicit target slot, or allocate one for slot 0.
    fn target(&mut self, requested: u32) -> ApiResult<u32> {
        self.check_target(requested)?;
        if requested == 0 {
            return self.allocate();
        }
        Ok(requested)
    }

    /// Load a whole serialized object into `slot` (0 allocates).
    pub fn insert_object(&mut self, bytes: Vec<u8>, root_code: u32, slot: u32) -> ApiResult<i64> {
        let slot = self.target(slot)?;
        self.objects.push(bytes);
        let entry = SlotEntry {
            object: self.objects.len() - 1,
            root_code,
            path: Vec::new(),
        };
        self.slots.insert(slot, entry);
        debug!(slot, "slot loaded");
        Ok(slot as i64)
    }

    fn entry(&self, slot: u32) -> ApiResult<&SlotEntry> {
        self.slots.get(&slot).ok_or(ApiError::DoesntExist)
    }

    fn resolve(&self, entry: &SlotEntry) -> ApiResult<Element<'_>> {
        let bytes = self.objects.get(entry.object).ok_or(ApiError::InternalError)?;
        let mut element = Element::root(bytes, entry.root_code);
        for selector in &entry.path {
            element = element.select(*selector).ok_or(ApiError::InternalError)?;
        }
        Ok(element)
    }

    pub fn element(&self, slot: u32) -> ApiResult<Element<'_>> {
        self.resolve(self.entry(slot)?)
    }

    pub fn clear(&mut self, slot: u32) -> ApiResult<i64> {
        if self.slots.remove(&slot).is_none() {
            return Err(ApiError::DoesntExist);
        }
        self.free.push_back(slot);
        Ok(1)
    }

    pub fn count(&self, slot: u32) -> ApiResult<i64> {
        let element = self.element(slot)?;
        if !element.is_array() {
            return Err(ApiError::NotAnArray);
        }
        count_children(element.payload)
            .map(|n| n as i64)
            .ok_or(ApiError::InternalError)
    }

    pub fn size(&self, slot: u32) -> ApiResult<i64> {
        Ok(self.element(slot)?.value.len() as i64)
    }

    /// Point `new_slot` (0 allocates, equal to `parent` replaces) at element
    /// `index` of the array in `parent`.
    pub fn subarray(&mut self, parent: u32, index: u32, new_slot: u32) -> ApiResult<i64> {
        let parent_entry = self.entry(parent)?.clone();
        let element = self.resolve(&parent_entry)?;
        if !element.is_array() {
            return Err(ApiError::NotAnArray);
        }
        if new_slot == 0 && self.no_free_slots() {
            return Err(ApiError::NoFreeSlots);
        }
        if new_slot > self.max_slots {
            return Err(ApiError::InvalidArgument);
        }
        if element.index(index).is_none() {
            return Err(ApiError::DoesntExist);
        }
        self.derive(parent_entry, Selector::Index(index), new_slot)
    }

    /// Point `new_slot` at field `field_id` of the object in `parent`.
    pub fn subfield(&mut self, parent: u32, field_id: u32, new_slot: u32) -> ApiResult<i64> {
        let parent_entry = self.entry(parent)?.clone();
        if new_slot == 0 && self.no_free_slots() {
            return Err(ApiError::NoFreeSlots);
        }
        if new_slot > self.max_slots {
            return Err(ApiError::InvalidArgument);
        }
        let code = FieldCode::from_id(field_id);
        if !code.is_known() {
            return Err(ApiError::InvalidField);
        }
        let element = self.resolve(&parent_entry)?;
        if !element.is_object() {
            return Err(ApiError::NotAnObject);
        }
        if element.field(code).is_none() {
            return Err(ApiError::DoesntExist);
        }
        self.derive(parent_entry, Selector::Field(code), new_slot)
    }

    fn derive(&mut self, mut entry: SlotEntry, selector: Selector, new_slot: u32) -> ApiResult<i64> {
        let fresh = new_slot == 0;
        let slot = if fresh { self.allocate()? } else { new_slot };
        entry.path.push(selector);
        if self.resolve(&entry).is_err() {
            if fresh {
                self.free.push_back(slot);
            }
            return Err(ApiError::InternalError);
        }
        self.slots.insert(slot, entry);
        Ok(slot as i64)
    }

    /// `flags == 0`: field id; `flags == 1`: 1 for a native amount.
    pub fn slot_type(&self, slot: u32, flags: u32) -> ApiResult<i64> {
        let element = self.element(slot)?;
        match flags {
            0 => Ok(element.field_id as i64),
            1 => {
                if !element.is_amount() {
                    return Err(ApiError::NotAnAmount);
                }
                let first = *element.payload.first().ok_or(ApiError::InternalError)?;
                Ok(if first & 0x80 == 0 { 1 } else { 0 })
            }
            _ => Err(ApiError::InvalidArgument),
        }
    }

    pub fn float(&self, slot: u32) -> ApiResult<i64> {
        let element = self.element(slot)?;
        if !element.is_amount() {
            return Err(ApiError::NotAnAmount);
        }
        xfl::from_amount(element.payload)
    }
}
