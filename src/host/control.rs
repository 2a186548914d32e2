//! Exits, guards and everything a hook can learn or change about its own
//! place in the chain.

use super::{HostResult, Terminated};
use crate::api::{ApiError, ApiResult, ExitType};
use crate::context::HookContext;
use crate::guard::GuardCheck;
use crate::ledger::Hash256;
use crate::memory::GuestMemory;
use tracing::{info, warn};

impl HookContext<'_> {
    pub(crate) fn guard(&mut self, id: u32, max_iterations: u32) -> HostResult {
        match self.guards.hit(id, max_iterations) {
            GuardCheck::Pass(_) => Ok(1),
            GuardCheck::Violation { id, hits } => {
                warn!(id, hits, max_iterations, "guard violation");
                self.exit(ExitType::Rollback, Vec::new(), ApiError::GuardViolation.code());
                Err(Terminated(ExitType::Rollback))
            }
        }
    }

    /// `accept` and `rollback`. An out-of-bounds reason is reported back to
    /// the guest instead of ending the run.
    pub(crate) fn hook_exit(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        code: i64,
        exit_type: ExitType,
    ) -> HostResult {
        let mut reason = Vec::new();
        if read_ptr != 0 {
            if !mem.in_bounds(read_ptr, read_len) {
                return Ok(ApiError::OutOfBounds.code());
            }
            let len = read_len.min(self.config.max_exit_reason_len as u32);
            reason = mem.read_vec(read_ptr, len).unwrap_or_default();
        }
        info!(
            exit = %exit_type,
            code,
            reason = %String::from_utf8_lossy(&reason),
            "hook exited"
        );
        self.exit(exit_type, reason, code);
        Err(Terminated(exit_type))
    }

    pub(crate) fn hook_account(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        if write_len < 20 {
            return Err(ApiError::TooSmall);
        }
        mem.write(write_ptr, 20, &self.result.account)
    }

    /// Hash of the hook at `hook_no` in this account's chain, -1 for self.
    pub(crate) fn hook_hash(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        hook_no: i32,
    ) -> ApiResult<i64> {
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        mem.check(write_ptr, write_len)?;
        if hook_no == -1 {
            return mem.write(write_ptr, 32, &self.result.hook_hash);
        }
        let hooks = self
            .view
            .hooks(&self.result.account)
            .ok_or(ApiError::InternalError)?;
        let hash = usize::try_from(hook_no)
            .ok()
            .and_then(|i| hooks.get(i))
            .and_then(|hook| hook.hook_hash)
            .ok_or(ApiError::DoesntExist)?;
        mem.write(write_ptr, 32, &hash)
    }

    pub(crate) fn hook_param(
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
        if read_len as usize > self.config.max_param_key_size {
            return Err(ApiError::TooBig);
        }

        let overridden = self
            .result
            .param_overrides
            .get(&self.result.hook_hash)
            .and_then(|params| params.get(&name));
        let value = match overridden {
            Some(value) => value,
            None => self.result.params.get(&name).ok_or(ApiError::DoesntExist)?,
        };
        // an empty override deletes the parameter
        if value.is_empty() {
            return Err(ApiError::DoesntExist);
        }
        mem.write(write_ptr, write_len, value)
    }

    /// Override a parameter of a hook later in the chain (or a later run of
    /// this one). Returns the value length.
    pub(crate) fn hook_param_set(
        &mut self,
        mem: &GuestMemory<'_>,
        (read_ptr, read_len): (u32, u32),
        (kread_ptr, kread_len): (u32, u32),
        (hread_ptr, hread_len): (u32, u32),
    ) -> ApiResult<i64> {
        mem.check(read_ptr, read_len)?;
        mem.check(kread_ptr, kread_len)?;
        mem.check(hread_ptr, hread_len)?;
        if kread_len < 1 {
            return Err(ApiError::TooSmall);
        }
        if kread_len as usize > self.config.max_param_key_size {
            return Err(ApiError::TooBig);
        }
        if hread_len != 32 {
            return Err(ApiError::InvalidArgument);
        }
        if read_len as usize > self.config.max_param_value_size {
            return Err(ApiError::TooBig);
        }
        if self.result.override_count >= self.config.max_params {
            return Err(ApiError::TooManyParams);
        }

        let hash: Hash256 = mem.read_array(hread_ptr)?;
        let name = mem.read_vec(kread_ptr, kread_len)?;
        let value = mem.read_vec(read_ptr, read_len)?;
        self.result.override_count += 1;
        self.result
            .param_overrides
            .entry(hash)
            .or_default()
            .insert(name, value);
        Ok(read_len as i64)
    }

    pub(crate) fn hook_again(&mut self) -> ApiResult<i64> {
        if self.result.execute_again_as_weak {
            return Err(ApiError::AlreadySet);
        }
        if !self.result.is_strong {
            return Err(ApiError::PrerequisiteNotMet);
        }
        self.result.execute_again_as_weak = true;
        Ok(1)
    }

    /// `flags == 0` skips a later hook in this chain, `flags == 1` undoes it.
    pub(crate) fn hook_skip(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        flags: u32,
    ) -> ApiResult<i64> {
        mem.check(read_ptr, read_len)?;
        if read_len != 32 || flags > 1 {
            return Err(ApiError::InvalidArgument);
        }
        let hash: Hash256 = mem.read_array(read_ptr)?;

        if flags == 1 {
            if !self.result.skips.remove(&hash) {
                return Err(ApiError::DoesntExist);
            }
            return Ok(1);
        }
        if self.result.skips.contains(&hash) {
            return Ok(1);
        }
        let hooks = self
            .view
            .hooks(&self.result.account)
            .ok_or(ApiError::InternalError)?;
        if !hooks.iter().any(|hook| hook.hook_hash == Some(hash)) {
            return Err(ApiError::DoesntExist);
        }
        self.result.skips.insert(hash);
        Ok(1)
    }
}
