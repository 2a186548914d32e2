//! The originating transaction, as the hook sees it.

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::memory::GuestMemory;
use crate::sto::{sf, sti, FieldCode, ObjectView};

/// Longest `HookParameterName` a transaction can carry.
const MAX_TXN_PARAM_NAME: u32 = 32;

impl HookContext<'_> {
    /// Id of the originating transaction. During an emit-failure callback a
    /// non-zero `flags` asks for the applying transaction instead of the
    /// failed one.
    pub(crate) fn otxn_id(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        flags: u32,
    ) -> ApiResult<i64> {
        let id = self.otxn.visible_id(flags != 0);
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        mem.check(write_ptr, write_len)?;
        mem.write(write_ptr, 32, &id)
    }

    pub(crate) fn otxn_type(&mut self) -> ApiResult<i64> {
        self.otxn
            .txn_type()
            .map(i64::from)
            .ok_or(ApiError::InvalidTxn)
    }

    pub(crate) fn otxn_field(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        field_id: u32,
    ) -> ApiResult<i64> {
        if write_ptr == 0 {
            if write_len != 0 {
                return Err(ApiError::InvalidArgument);
            }
        } else {
            mem.check(write_ptr, write_len)?;
        }
        let code = FieldCode::from_id(field_id);
        if !code.is_known() {
            return Err(ApiError::InvalidField);
        }
        let txn = ObjectView::parse(self.otxn.visible()).ok_or(ApiError::InvalidTxn)?;
        let value = txn.value(code).ok_or(ApiError::DoesntExist)?;
        mem.write_or_return(write_ptr, write_len, value, code.type_code == sti::ACCOUNT)
    }

    /// Value of a `HookParameters` entry on the originating transaction.
    pub(crate) fn otxn_param(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        let name = mem.read_vec(read_ptr, read_len)?;
        if read_len < 1 {
            return Err(ApiError::TooSmall);
        }
        if read_len > MAX_TXN_PARAM_NAME {
            return Err(ApiError::TooBig);
        }

        let txn = ObjectView::parse(self.otxn.visible()).ok_or(ApiError::InvalidTxn)?;
        let params = txn
            .array(sf::HOOK_PARAMETERS)
            .ok_or(ApiError::DoesntExist)?;
        let value = params
            .iter()
            .find(|(_, param)| param.payload(sf::HOOK_PARAMETER_NAME) == Some(name.as_slice()))
            .and_then(|(_, param)| param.payload(sf::HOOK_PARAMETER_VALUE))
            .filter(|value| !value.is_empty())
            .ok_or(ApiError::DoesntExist)?;
        if value.len() > write_len as usize {
            return Err(ApiError::TooSmall);
        }
        mem.write(write_ptr, write_len, value)
    }
}
