//! `state`, `state_set` and their foreign variants. The local forms are the
//! foreign ones with zero namespace and account arguments.

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::ledger::{AccountId, Hash256};
use crate::memory::GuestMemory;
use crate::state::{grant_permits, make_state_key};
use tracing::debug;

fn optional_region(mem: &GuestMemory<'_>, (ptr, len): (u32, u32)) -> ApiResult<Option<Vec<u8>>> {
    if ptr == 0 && len == 0 {
        return Ok(None);
    }
    mem.read_vec(ptr, len).map(Some)
}

impl HookContext<'_> {
    pub(crate) fn state_foreign_set(
        &mut self,
        mem: &GuestMemory<'_>,
        (read_ptr, read_len): (u32, u32),
        (kread_ptr, kread_len): (u32, u32),
        (nread_ptr, nread_len): (u32, u32),
        (aread_ptr, aread_len): (u32, u32),
    ) -> ApiResult<i64> {
        // a zero value region deletes
        if read_ptr != 0 || read_len != 0 {
            mem.check(read_ptr, read_len)?;
        }
        if kread_len > 32 {
            return Err(ApiError::TooBig);
        }
        if kread_len < 1 {
            return Err(ApiError::TooSmall);
        }
        if nread_len != 0 && nread_len != 32 {
            return Err(ApiError::InvalidArgument);
        }
        if aread_len != 0 && aread_len != 20 {
            return Err(ApiError::InvalidArgument);
        }
        mem.check(kread_ptr, kread_len)?;
        let namespace_given = nread_ptr != 0 || nread_len != 0;
        let account_given = aread_ptr != 0 || aread_len != 0;
        if !namespace_given && account_given {
            return Err(ApiError::InvalidArgument);
        }
        if read_len as usize > self.config.max_state_data_size {
            return Err(ApiError::TooBig);
        }

        let namespace: Hash256 = match optional_region(mem, (nread_ptr, nread_len))? {
            Some(ns) => ns.try_into().map_err(|_| ApiError::InvalidArgument)?,
            None => self.result.namespace,
        };
        let account: AccountId = match optional_region(mem, (aread_ptr, aread_len))? {
            Some(id) => id.try_into().map_err(|_| ApiError::InvalidArgument)?,
            None => self.result.account,
        };
        let data = if read_ptr == 0 && read_len == 0 {
            Vec::new()
        } else {
            mem.read_vec(read_ptr, read_len)?
        };

        if self.view.account(&self.result.account).is_none() {
            return Err(ApiError::InternalError);
        }
        let key = make_state_key(mem.read(kread_ptr, kread_len)?).ok_or(ApiError::InvalidArgument)?;

        if account != self.result.account {
            self.authorize_foreign_write(&account, &namespace, &key)?;
        }

        let counted = self.state.set(
            self.view,
            self.config,
            &account,
            &namespace,
            &key,
            data,
            true,
        )?;
        if counted {
            self.result.changed_state_count = self.result.changed_state_count.saturating_add(1);
        }
        debug!(
            account = %hex::encode(account),
            key = %hex::encode(key),
            len = read_len,
            "state set"
        );
        Ok(read_len as i64)
    }

    /// Foreign writes need a grant. The first denial disables them for the
    /// rest of this execution.
    fn authorize_foreign_write(
        &mut self,
        owner: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
    ) -> ApiResult<()> {
        if self.result.foreign_state_set_disabled {
            return Err(ApiError::PreviousFailurePreventsRetry);
        }
        // already written under a grant earlier in the chain
        if self
            .state
            .get(owner, namespace, key)
            .is_some_and(|value| value.is_modified())
        {
            return Ok(());
        }
        let permitted = grant_permits(
            self.view,
            owner,
            namespace,
            &self.result.hook_hash,
            &self.result.account,
        )
        .ok_or(ApiError::InternalError)?;
        if !permitted {
            self.result.foreign_state_set_disabled = true;
            return Err(ApiError::NotAuthorized);
        }
        Ok(())
    }

    pub(crate) fn state_foreign(
        &mut self,
        mem: &mut GuestMemory<'_>,
        (write_ptr, write_len): (u32, u32),
        (kread_ptr, kread_len): (u32, u32),
        (nread_ptr, nread_len): (u32, u32),
        (aread_ptr, aread_len): (u32, u32),
    ) -> ApiResult<i64> {
        let is_foreign = aread_ptr != 0;
        if !is_foreign && aread_len != 0 {
            return Err(ApiError::InvalidArgument);
        }
        if is_foreign && aread_len != 20 {
            return Err(ApiError::InvalidArgument);
        }
        if kread_len > 32 {
            return Err(ApiError::TooBig);
        }
        if kread_len < 1 {
            return Err(ApiError::TooSmall);
        }
        if write_ptr != 0 && write_len < 1 {
            return Err(ApiError::TooSmall);
        }
        if (is_foreign || nread_ptr != 0 || nread_len != 0) && nread_len != 32 {
            return Err(ApiError::InvalidArgument);
        }
        if write_ptr != 0 {
            mem.check(write_ptr, write_len)?;
        }
        mem.check(kread_ptr, kread_len)?;
        mem.check(nread_ptr, nread_len)?;
        mem.check(aread_ptr, aread_len)?;

        let key = make_state_key(mem.read(kread_ptr, kread_len)?).ok_or(ApiError::InvalidArgument)?;
        let namespace: Hash256 = if nread_len == 32 {
            mem.read_array(nread_ptr)?
        } else {
            self.result.namespace
        };
        let account: AccountId = if is_foreign {
            mem.read_array(aread_ptr)?
        } else {
            self.result.account
        };

        let data = self
            .state
            .read(self.view, self.config, &account, &namespace, &key)?;
        mem.write_or_return(write_ptr, write_len, &data, false)
    }
}

#[cfg(test)]
mod tests {
    use crate::host::testing::{Fixture, HOOK_ACCOUNT, HOOK_HASH, NAMESPACE, OTXN_ACCOUNT};
    use crate::host::HostFunction as F;
    use crate::ledger::{HookGrant, InstalledHook};
    use crate::state::{make_state_key, StateValue};

    #[test]
    fn test_local_set_then_read() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 128];
        mem[..5].copy_from_slice(b"hello");
        mem[32] = 7;

        assert_eq!(ctx.call(&mut mem, F::StateSet, &[0, 5, 32, 1]), Ok(5));
        assert_eq!(ctx.result.changed_state_count, 1);
        assert_eq!(ctx.call(&mut mem, F::State, &[64, 16, 32, 1]), Ok(5));
        assert_eq!(&mem[64..69], b"hello");
        // return mode packs the value
        assert_eq!(
            ctx.call(&mut mem, F::State, &[0, 0, 32, 1]),
            Ok(0x68656c6c6f)
        );
        // delete
        assert_eq!(ctx.call(&mut mem, F::StateSet, &[0, 0, 32, 1]), Ok(0));
        drop(ctx);

        let key = make_state_key(&[7]).unwrap();
        assert_eq!(
            fx.state.get(&HOOK_ACCOUNT, &NAMESPACE, &key),
            Some(&StateValue::Modified(Vec::new()))
        );
    }

    #[test]
    fn test_set_argument_rules() {
        let mut fx = Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 512];
        assert_eq!(ctx.call(&mut mem, F::StateSet, &[0, 4, 32, 33]), Ok(-3));
        assert_eq!(ctx.call(&mut mem, F::StateSet, &[0, 4, 32, 0]), Ok(-4));
        assert_eq!(ctx.call(&mut mem, F::StateSet, &[0, 257, 32, 1]), Ok(-3));
        assert_eq!(
            ctx.call(&mut mem, F::StateForeignSet, &[0, 4, 32, 1, 0, 0, 64, 20]),
            Ok(-7)
        );
        assert_eq!(
            ctx.call(&mut mem, F::StateForeignSet, &[0, 4, 32, 1, 64, 31, 0, 0]),
            Ok(-7)
        );
        assert_eq!(ctx.call(&mut mem, F::State, &[0, 0, 32, 1]), Ok(-5));
        assert_eq!(
            ctx.call(&mut mem, F::StateForeign, &[0, 0, 32, 1, 0, 0, 64, 20]),
            Ok(-7)
        );
    }

    #[test]
    fn test_foreign_write_requires_grant() {
        let mut fx = Fixture::new();
        let mut mem = vec![0u8; 128];
        mem[..2].copy_from_slice(b"hi");
        mem[32] = 1;
        mem[64..96].copy_from_slice(&NAMESPACE);
        mem[96..116].copy_from_slice(&OTXN_ACCOUNT);
        let args = [0, 2, 32, 1, 64, 32, 96, 20];

        // the foreign account has no hooks at all
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        assert_eq!(ctx.call(&mut mem, F::StateForeignSet, &args), Ok(-2));
        drop(ctx);

        fx.view.set_hooks(OTXN_ACCOUNT, vec![InstalledHook {
            hook_hash: Some([0x99; 32]),
            namespace: Some(NAMESPACE),
            ..InstalledHook::default()
        }]);
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        assert_eq!(ctx.call(&mut mem, F::StateForeignSet, &args), Ok(-34));
        assert_eq!(ctx.call(&mut mem, F::StateForeignSet, &args), Ok(-35));
        drop(ctx);

        fx.view.set_hooks(OTXN_ACCOUNT, vec![InstalledHook {
            hook_hash: Some([0x99; 32]),
            namespace: Some(NAMESPACE),
            grants: vec![HookGrant {
                hook_hash: HOOK_HASH,
                authorize: Some(HOOK_ACCOUNT),
            }],
            ..InstalledHook::default()
        }]);
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        assert_eq!(ctx.call(&mut mem, F::StateForeignSet, &args), Ok(2));
        assert_eq!(
            ctx.call(&mut mem, F::StateForeign, &[0, 0, 32, 1, 64, 32, 96, 20]),
            Ok(0x6869)
        );
    }

    #[test]
    fn test_uncacheable_foreign_read_is_internal_error() {
        let orphan = [0xEE; 20];
        let key = make_state_key(&[1]).unwrap();
        let mut fx = Fixture::new();
        fx.view = std::mem::take(&mut fx.view).with_state(orphan, NAMESPACE, key, b"hi".to_vec());

        let mut mem = vec![0u8; 128];
        mem[32] = 1;
        mem[64..96].copy_from_slice(&NAMESPACE);
        mem[96..116].copy_from_slice(&orphan);
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        assert_eq!(
            ctx.call(&mut mem, F::StateForeign, &[0, 0, 32, 1, 64, 32, 96, 20]),
            Ok(-2)
        );
    }
}
