//! Float host functions that touch guest memory. The pure arithmetic is
//! dispatched straight to [`crate::xfl`].

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::memory::GuestMemory;
use crate::xfl::{self, StoTarget};

impl HookContext<'_> {
    pub(crate) fn float_set(&mut self, exponent: i32, mantissa: i64) -> ApiResult<i64> {
        xfl::set(exponent, mantissa)
    }

    /// Serialize an XFL as an amount: native, bare issued, or a full field
    /// with currency and issuer.
    pub(crate) fn float_sto(
        &mut self,
        mem: &mut GuestMemory<'_>,
        (write_ptr, write_len): (u32, u32),
        (cread_ptr, cread_len): (u32, u32),
        (iread_ptr, iread_len): (u32, u32),
        float: i64,
        field_code: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;

        let currency = if cread_len == 0 {
            if cread_ptr != 0 {
                return Err(ApiError::InvalidArgument);
            }
            None
        } else {
            if cread_len != 20 && cread_len != 3 {
                return Err(ApiError::InvalidArgument);
            }
            let raw = mem.read(cread_ptr, cread_len)?;
            Some(xfl::parse_currency(raw).ok_or(ApiError::InvalidArgument)?)
        };

        let issuer = if iread_len == 0 {
            if iread_ptr != 0 {
                return Err(ApiError::InvalidArgument);
            }
            None
        } else {
            if iread_len != 20 {
                return Err(ApiError::InvalidArgument);
            }
            Some(mem.read_array::<20>(iread_ptr)?)
        };

        let target = StoTarget::from_field_code(field_code);
        let out = xfl::to_sto(float, currency, issuer, target, write_len as usize)?;
        if out.len() > write_len as usize {
            return Err(ApiError::TooSmall);
        }
        mem.write(write_ptr, write_len, &out)
    }

    pub(crate) fn float_sto_set(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        if read_len < 8 {
            return Err(ApiError::NotAnObject);
        }
        xfl::from_sto(mem.read(read_ptr, read_len)?)
    }
}
