//! Ledger header values, deterministic per-execution nonces and keylet
//! range lookups.

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::ledger::keylet::{sha512_half, KEYLET_LEN};
use crate::ledger::Keylet;
use crate::memory::GuestMemory;

const LEDGER_NONCE_PREFIX: &[u8] = b"NCE\0";

impl HookContext<'_> {
    pub(crate) fn fee_base(&mut self) -> ApiResult<i64> {
        i64::try_from(self.view.fees().base).map_err(|_| ApiError::FeeTooLarge)
    }

    pub(crate) fn ledger_last_hash(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        mem.write(write_ptr, 32, &self.view.info().parent_hash)
    }

    /// A pseudo-random value unique to this ledger, transaction, account
    /// and call.
    pub(crate) fn ledger_nonce(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
    ) -> ApiResult<i64> {
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        mem.check(write_ptr, write_len)?;
        if self.ledger_nonce_counter > self.config.max_nonce {
            return Err(ApiError::TooManyNonces);
        }
        self.ledger_nonce_counter += 1;

        let info = self.view.info();
        let counter = (self.ledger_nonce_counter as u16).to_be_bytes();
        let nonce = sha512_half(&[
            LEDGER_NONCE_PREFIX,
            &info.seq.to_be_bytes(),
            &info.parent_close_time.to_be_bytes(),
            &info.parent_hash,
            &self.otxn.id,
            &counter,
            &self.result.account,
        ]);
        mem.write(write_ptr, 32, &nonce)
    }

    /// First existing entry strictly after `lo` and no later than `hi`.
    pub(crate) fn ledger_keylet(
        &mut self,
        mem: &mut GuestMemory<'_>,
        (write_ptr, write_len): (u32, u32),
        (lread_ptr, lread_len): (u32, u32),
        (hread_ptr, hread_len): (u32, u32),
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        mem.check(lread_ptr, lread_len)?;
        mem.check(hread_ptr, hread_len)?;
        let lengths = [write_len, lread_len, hread_len];
        if lengths.iter().any(|len| (*len as usize) < KEYLET_LEN) {
            return Err(ApiError::TooSmall);
        }
        if lengths.iter().any(|len| *len as usize > KEYLET_LEN) {
            return Err(ApiError::TooBig);
        }

        let lo = Keylet::from_bytes(mem.read(lread_ptr, lread_len)?)
            .ok_or(ApiError::InvalidArgument)?;
        let hi = Keylet::from_bytes(mem.read(hread_ptr, hread_len)?)
            .ok_or(ApiError::InvalidArgument)?;
        if lo.entry_type != hi.entry_type {
            return Err(ApiError::DoesNotMatch);
        }
        let found = self
            .view
            .successor(&lo.key, &hi.key)
            .ok_or(ApiError::DoesntExist)?;
        let keylet = Keylet::new(lo.entry_type, found);
        mem.write(write_ptr, KEYLET_LEN as u32, &keylet.to_bytes())
    }
}
