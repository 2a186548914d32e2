//! Loading objects into slots and reading them back out. Navigation
//! (`slot_subfield`, `slot_count`, ...) goes straight to the slot table.

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::ledger::keylet::KEYLET_LEN;
use crate::ledger::{Hash256, Keylet};
use crate::memory::GuestMemory;
use crate::slot::root;
use crate::sto::sti;

impl HookContext<'_> {
    /// Serialized contents of a slot, or up to eight bytes as the return
    /// value when `write_ptr` is zero.
    pub(crate) fn slot(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        slot: u32,
    ) -> ApiResult<i64> {
        if write_ptr == 0 {
            if write_len != 0 {
                return Err(ApiError::InvalidArgument);
            }
        } else {
            mem.check(write_ptr, write_len)?;
            if write_len < 1 {
                return Err(ApiError::TooSmall);
            }
        }
        let element = self.slots.element(slot)?;
        mem.write_or_return(
            write_ptr,
            write_len,
            element.value,
            element.type_code == sti::ACCOUNT,
        )
    }

    /// Load a ledger entry (34-byte keylet) or a transaction (32-byte id).
    pub(crate) fn slot_set(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        slot_into: u32,
    ) -> ApiResult<i64> {
        mem.check(read_ptr, read_len)?;
        if read_len as usize != KEYLET_LEN && read_len != 32 {
            return Err(ApiError::InvalidArgument);
        }
        self.slots.check_target(slot_into)?;

        let raw = mem.read(read_ptr, read_len)?;
        let (bytes, root_code) = if read_len as usize == KEYLET_LEN {
            let keylet = Keylet::from_bytes(raw).ok_or(ApiError::InvalidArgument)?;
            if keylet.key == [0; 32] {
                return Err(ApiError::DoesntExist);
            }
            let entry = self.view.read(&keylet).ok_or(ApiError::DoesntExist)?;
            (entry, root::LEDGER_ENTRY)
        } else {
            let id: Hash256 = raw.try_into().map_err(|_| ApiError::InvalidArgument)?;
            let txn = self.view.transaction(&id).ok_or(ApiError::DoesntExist)?;
            (txn, root::TRANSACTION)
        };
        self.slots.insert_object(bytes, root_code, slot_into)
    }

    pub(crate) fn otxn_slot(&mut self, slot_into: u32) -> ApiResult<i64> {
        self.slots.check_target(slot_into)?;
        let txn = self.otxn.visible().to_vec();
        self.slots.insert_object(txn, root::TRANSACTION, slot_into)
    }

    /// Provisional metadata is only known once the transaction has been
    /// applied, so only weak and again-as-weak runs see it.
    pub(crate) fn meta_slot(&mut self, slot_into: u32) -> ApiResult<i64> {
        let meta = self
            .provisional_meta
            .clone()
            .ok_or(ApiError::PrerequisiteNotMet)?;
        self.slots.check_target(slot_into)?;
        self.slots.insert_object(meta, root::METADATA, slot_into)
    }

    /// Import proofs are not part of this engine.
    pub(crate) fn xpop_slot(&mut self, _slot_into_tx: u32, _slot_into_meta: u32) -> ApiResult<i64> {
        Err(ApiError::PrerequisiteNotMet)
    }
}
