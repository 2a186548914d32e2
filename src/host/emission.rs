//! Guest-facing side of emission. Bookkeeping and validation live in
//! [`crate::emit`]; these functions move bytes in and out of guest memory.

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::emit::{self, validate_emission};
use crate::memory::GuestMemory;
use tracing::info;

impl HookContext<'_> {
    pub(crate) fn etxn_reserve(&mut self, count: u32) -> ApiResult<i64> {
        self.emit.reserve(count, self.config)
    }

    pub(crate) fn etxn_burden(&mut self) -> ApiResult<i64> {
        self.emit.etxn_burden(self.otxn.visible())
    }

    pub(crate) fn etxn_generation(&mut self) -> ApiResult<i64> {
        Ok(self.emit.etxn_generation(self.otxn.visible()))
    }

    pub(crate) fn etxn_fee_base(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        emit::fee_base(&self.emit, self.view, mem.read(read_ptr, read_len)?)
    }

    pub(crate) fn etxn_nonce(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        let config = self.config;
        let (state, origin) = self.emit_parts();
        let nonce = state.nonce(&origin, config)?;
        mem.write(write_ptr, 32, &nonce)
    }

    pub(crate) fn etxn_details(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        let config = self.config;
        let (state, origin) = self.emit_parts();
        let details = state.details(&origin, config, write_len as usize)?;
        mem.write(write_ptr, write_len, &details)
    }

    /// Queue a transaction for emission. Writes its 32-byte id.
    pub(crate) fn emit(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        let blob = mem.read_vec(read_ptr, read_len)?;
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }

        let (view, config) = (self.view, self.config);
        let queued = self.result.emitted.len();
        let (state, origin) = self.emit_parts();
        let emitted = validate_emission(state, queued, &origin, view, config, &blob)?;

        let written = mem.write(write_ptr, 32, &emitted.id)?;
        info!(
            txid = %hex::encode_upper(emitted.id),
            queued = queued + 1,
            "transaction emitted"
        );
        self.result.emitted.push(emitted);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use crate::emit::{transaction_id, DETAILS_LEN_NO_CALLBACK};
    use crate::host::testing::{Fixture, HOOK_ACCOUNT};
    use crate::host::HostFunction as F;
    use crate::sto::{sf, ObjectBuilder, ObjectView};

    #[test]
    fn test_reserve_burden_generation() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = Vec::<u8>::new();
        assert_eq!(ctx.call(&mut mem, F::EtxnBurden, &[]), Ok(-9));
        assert_eq!(ctx.call(&mut mem, F::EtxnReserve, &[2]), Ok(2));
        assert_eq!(ctx.call(&mut mem, F::EtxnReserve, &[2]), Ok(-8));
        assert_eq!(ctx.call(&mut mem, F::EtxnBurden, &[]), Ok(2));
        assert_eq!(ctx.call(&mut mem, F::EtxnGeneration, &[]), Ok(1));
        assert_eq!(ctx.call(&mut mem, F::OtxnBurden, &[]), Ok(1));
        assert_eq!(ctx.call(&mut mem, F::OtxnGeneration, &[]), Ok(0));
    }

    #[test]
    fn test_nonce_needs_room() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 64];
        assert_eq!(ctx.call(&mut mem, F::EtxnNonce, &[0, 31]), Ok(-4));
        assert_eq!(ctx.call(&mut mem, F::EtxnNonce, &[0, 32]), Ok(32));
        let first = mem[..32].to_vec();
        assert_eq!(ctx.call(&mut mem, F::EtxnNonce, &[0, 32]), Ok(32));
        assert_ne!(&mem[..32], &first[..]);
    }

    #[test]
    fn test_emit_round_trip() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 1024];

        assert_eq!(ctx.call(&mut mem, F::EtxnDetails, &[0, 200]), Ok(-9));
        assert_eq!(ctx.call(&mut mem, F::EtxnReserve, &[1]), Ok(1));
        let len = ctx.call(&mut mem, F::EtxnDetails, &[0, 200]).unwrap();
        assert_eq!(len as usize, DETAILS_LEN_NO_CALLBACK);

        let wrapper = ObjectView::parse(&mem[..len as usize]).unwrap();
        let details = wrapper.object(sf::EMIT_DETAILS).unwrap();
        let inner = ObjectBuilder::new()
            .u32(sf::EMIT_GENERATION, details.u32(sf::EMIT_GENERATION).unwrap())
            .u64(sf::EMIT_BURDEN, details.u64(sf::EMIT_BURDEN).unwrap())
            .h256(sf::EMIT_PARENT_TXN_ID, &details.h256(sf::EMIT_PARENT_TXN_ID).unwrap())
            .h256(sf::EMIT_NONCE, &details.h256(sf::EMIT_NONCE).unwrap())
            .h256(sf::EMIT_HOOK_HASH, &details.h256(sf::EMIT_HOOK_HASH).unwrap());
        let blob = ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 0)
            .u32(sf::SEQUENCE, 0)
            .u32(sf::FIRST_LEDGER_SEQUENCE, 101)
            .u32(sf::LAST_LEDGER_SEQUENCE, 104)
            .drops(sf::AMOUNT, 500)
            .drops(sf::FEE, 20)
            .vl(sf::SIGNING_PUB_KEY, &[])
            .account(sf::ACCOUNT, &HOOK_ACCOUNT)
            .account(sf::DESTINATION, &[0xC3; 20])
            .object(sf::EMIT_DETAILS, inner)
            .build();
        mem[256..256 + blob.len()].copy_from_slice(&blob);
        let blob_len = blob.len() as i64;

        assert_eq!(ctx.call(&mut mem, F::EtxnFeeBase, &[256, blob_len]), Ok(10));
        assert_eq!(ctx.call(&mut mem, F::Emit, &[0, 32, 256, blob_len]), Ok(32));
        assert_eq!(&mem[..32], &transaction_id(&blob));
        // reservation used up
        assert_eq!(ctx.call(&mut mem, F::Emit, &[0, 32, 256, blob_len]), Ok(-13));

        let result = ctx.finish();
        assert_eq!(result.emitted.len(), 1);
        assert_eq!(result.emitted[0].blob, blob);
    }

    #[test]
    fn test_emit_without_reservation() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 64];
        assert_eq!(ctx.call(&mut mem, F::Emit, &[0, 32, 32, 8]), Ok(-9));
        assert_eq!(ctx.call(&mut mem, F::Emit, &[0, 16, 32, 8]), Ok(-4));
        assert_eq!(ctx.call(&mut mem, F::EtxnFeeBase, &[32, 8]), Ok(-9));
    }
}
