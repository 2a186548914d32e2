//! Runs hooks.
//!
//! [`HookExecutor::execute`] runs one hook to completion and turns however
//! the guest stopped into a [`HookResult`]. [`HookExecutor::run_chain`]
//! walks an account's installed hooks in order, carrying skips and
//! parameter overrides from each hook to the ones after it.

use super::result::ChainOutcome;
use super::{Entry, GuestOutcome, GuestRuntime};
use crate::api::ExitType;
use crate::config::EngineConfig;
use crate::context::{HookContext, HookParams, HookResult, HookSetup, OriginatingTxn, ParamOverrides};
use crate::ledger::{AccountId, Hash256, LedgerView};
use crate::state::HookStateMap;
use crate::{EngineError, Result};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Which chain to run and how.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainRequest {
    /// Account whose hooks run.
    pub account: AccountId,
    /// Strong hooks can roll back the originating transaction.
    pub is_strong: bool,
    pub wasm_param: u32,
    /// Metadata of the applied transaction, for weak executions.
    pub provisional_meta: Option<Vec<u8>>,
}

pub struct HookExecutor<'a, R: GuestRuntime> {
    runtime: &'a R,
    config: &'a EngineConfig,
}

impl<'a, R: GuestRuntime> HookExecutor<'a, R> {
    pub fn new(runtime: &'a R, config: &'a EngineConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &EngineConfig {
        self.config
    }

    /// Run one hook. Never fails: guest faults become `WasmError` results.
    #[tracing::instrument(
        skip_all,
        fields(
            account = %hex::encode_upper(setup.account),
            hook = %hex::encode_upper(setup.hook_hash),
            position = setup.chain_position,
        )
    )]
    pub fn execute(
        &self,
        view: &dyn LedgerView,
        otxn: &OriginatingTxn,
        state: &mut HookStateMap,
        bytecode: &[u8],
        setup: HookSetup,
    ) -> HookResult {
        let entry = if setup.is_callback {
            Entry::Callback
        } else {
            Entry::Hook
        };
        let argument = setup.wasm_param;
        let mut ctx = HookContext::new(view, self.config, otxn, state, setup);
        let run = self.runtime.execute(bytecode, entry, argument, &mut ctx);

        match run.outcome {
            GuestOutcome::Terminated(_) => {}
            GuestOutcome::Returned(value) => {
                if !ctx.terminated() {
                    debug!(value, "hook returned without accept or rollback");
                }
            }
            GuestOutcome::Trapped(message) => {
                if !ctx.terminated() {
                    warn!(%message, "guest trapped");
                    ctx.exit(ExitType::WasmError, Vec::new(), -1);
                }
            }
        }

        let mut result = ctx.finish();
        result.instruction_count = run.instructions;
        info!(
            exit = %result.exit_type,
            code = result.exit_code,
            reason = %result.exit_reason_lossy(),
            instructions = result.instruction_count,
            emitted = result.emitted.len(),
            "hook finished"
        );
        result
    }

    /// Run the account's hook chain, stopping at the first hook that does
    /// not accept.
    #[tracing::instrument(
        skip_all,
        fields(account = %hex::encode_upper(request.account), strong = request.is_strong)
    )]
    pub fn run_chain(
        &self,
        view: &dyn LedgerView,
        otxn: &OriginatingTxn,
        state: &mut HookStateMap,
        request: &ChainRequest,
    ) -> Result<ChainOutcome> {
        let mut outcome = ChainOutcome::default();
        let Some(hooks) = view.hooks(&request.account) else {
            debug!("account has no hooks");
            return Ok(outcome);
        };

        let mut skips: BTreeSet<Hash256> = BTreeSet::new();
        let mut overrides = ParamOverrides::new();

        for (position, installed) in hooks.iter().enumerate() {
            let Some(hook_hash) = installed.hook_hash else {
                continue;
            };
            if skips.contains(&hook_hash) {
                debug!(hook = %hex::encode_upper(hook_hash), "skipped by earlier hook");
                continue;
            }
            let definition = view.hook_definition(&hook_hash).ok_or_else(|| {
                EngineError::Ledger(format!(
                    "missing hook definition {}",
                    hex::encode_upper(hook_hash)
                ))
            })?;

            let mut params: HookParams = definition.parameters.iter().cloned().collect();
            params.extend(installed.parameters.iter().cloned());

            let setup = HookSetup {
                account: request.account,
                hook_hash,
                namespace: installed.namespace.unwrap_or(definition.namespace),
                params,
                param_overrides: overrides.clone(),
                chain_position: u32::try_from(position)
                    .map_err(|_| EngineError::Ledger("hook chain too long".into()))?,
                is_strong: request.is_strong,
                is_callback: false,
                has_callback: self.runtime.exports(&definition.code, "cbak"),
                wasm_param: request.wasm_param,
                provisional_meta: request.provisional_meta.clone(),
            };

            let result = self.execute(view, otxn, state, &definition.code, setup);
            overrides = result.param_overrides.clone();
            skips.extend(result.skips.iter().copied());
            let accepted = result.accepted();
            outcome.results.push(result);
            if !accepted {
                info!(position, "hook chain stopped");
                break;
            }
        }
        Ok(outcome)
    }

    /// Run a hook's `cbak` after one of its emitted transactions was
    /// processed. `failed` is passed to the guest as its argument.
    #[tracing::instrument(skip_all, fields(hook = %hex::encode_upper(hook_hash)))]
    pub fn run_callback(
        &self,
        view: &dyn LedgerView,
        otxn: &OriginatingTxn,
        state: &mut HookStateMap,
        account: &AccountId,
        hook_hash: &Hash256,
        failed: bool,
    ) -> Result<HookResult> {
        let definition = view.hook_definition(hook_hash).ok_or_else(|| {
            EngineError::Ledger(format!(
                "missing hook definition {}",
                hex::encode_upper(hook_hash)
            ))
        })?;
        let hooks = view.hooks(account).unwrap_or_default();
        let (position, installed) = hooks
            .iter()
            .enumerate()
            .find(|(_, hook)| hook.hook_hash.as_ref() == Some(hook_hash))
            .ok_or_else(|| EngineError::Ledger("callback hook is not installed".into()))?;

        let mut params: HookParams = definition.parameters.iter().cloned().collect();
        params.extend(installed.parameters.iter().cloned());
        let setup = HookSetup {
            account: *account,
            hook_hash: *hook_hash,
            namespace: installed.namespace.unwrap_or(definition.namespace),
            params,
            chain_position: position as u32,
            is_callback: true,
            has_callback: true,
            wasm_param: failed as u32,
            ..HookSetup::default()
        };
        Ok(self.execute(view, otxn, state, &definition.code, setup))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::{otxn_bytes, HOOK_ACCOUNT, NAMESPACE};
    use crate::host::HostFunction as F;
    use crate::ledger::{AccountRoot, Fees, HookDefinition, InstalledHook, LedgerInfo, MemoryLedger};
    use crate::runtime::{hook_hash, NativeError, NativeHook, NativeRuntime};

    fn definition(code: &[u8]) -> HookDefinition {
        HookDefinition {
            hook_hash: hook_hash(code),
            namespace: NAMESPACE,
            parameters: vec![(b"who".to_vec(), b"def".to_vec())],
            code: code.to_vec(),
        }
    }

    fn ledger(codes: &[&str]) -> MemoryLedger {
        let hooks = codes
            .iter()
            .map(|code| InstalledHook {
                hook_hash: Some(hook_hash(code.as_bytes())),
                ..InstalledHook::default()
            })
            .collect();
        let mut view = MemoryLedger::new(LedgerInfo::default(), Fees::default())
            .with_account(AccountRoot::new(HOOK_ACCOUNT, 50_000_000))
            .with_hooks(HOOK_ACCOUNT, hooks);
        for code in codes {
            view = view.with_definition(definition(code.as_bytes()));
        }
        view
    }

    fn accept() -> NativeHook {
        NativeHook::new(|g| {
            g.call(F::Accept, &[0, 0, 0])?;
            Ok(0)
        })
    }

    fn request() -> ChainRequest {
        ChainRequest {
            account: HOOK_ACCOUNT,
            is_strong: true,
            ..ChainRequest::default()
        }
    }

    #[test]
    fn test_return_without_exit_is_rollback() {
        let runtime = NativeRuntime::new().with_program(b"lazy", NativeHook::new(|_| Ok(0)));
        let view = ledger(&["lazy"]);
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let outcome = HookExecutor::new(&runtime, &config)
            .run_chain(&view, &otxn, &mut state, &request())
            .unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].exit_type, ExitType::Rollback);
        assert_eq!(outcome.results[0].exit_code, -1);
        assert!(!outcome.accepted());
    }

    #[test]
    fn test_trap_is_wasm_error() {
        let runtime = NativeRuntime::new().with_program(
            b"broken",
            NativeHook::new(|_| Err(NativeError::Trap("unreachable".into()))),
        );
        let view = ledger(&["broken"]);
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let outcome = HookExecutor::new(&runtime, &config)
            .run_chain(&view, &otxn, &mut state, &request())
            .unwrap();
        assert_eq!(outcome.results[0].exit_type, ExitType::WasmError);
    }

    #[test]
    fn test_chain_stops_at_rollback() {
        let runtime = NativeRuntime::new()
            .with_program(b"first", accept())
            .with_program(
                b"second",
                NativeHook::new(|g| {
                    g.call(F::Rollback, &[0, 0, 3])?;
                    Ok(0)
                }),
            )
            .with_program(b"third", accept());
        let view = ledger(&["first", "second", "third"]);
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let outcome = HookExecutor::new(&runtime, &config)
            .run_chain(&view, &otxn, &mut state, &request())
            .unwrap();
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.rejection().unwrap().exit_code, 3);
        assert_eq!(outcome.rejection().unwrap().chain_position, 1);
    }

    #[test]
    fn test_skip_and_param_override_carry_forward() {
        let third = hook_hash(b"third");
        let second = hook_hash(b"second");
        let runtime = NativeRuntime::new()
            .with_program(
                b"first",
                NativeHook::new(move |g| {
                    g.write(0, &third)?;
                    g.call(F::HookSkip, &[0, 32, 0])?;
                    g.write(32, b"newwho")?;
                    g.write(64, &second)?;
                    g.call(F::HookParamSet, &[32, 3, 35, 3, 64, 32])?;
                    g.call(F::Accept, &[0, 0, 0])?;
                    Ok(0)
                }),
            )
            .with_program(
                b"second",
                NativeHook::new(|g| {
                    g.write(0, b"who")?;
                    let len = g.call(F::HookParam, &[16, 16, 0, 3])?;
                    g.call(F::Accept, &[16, len, 0])?;
                    Ok(0)
                }),
            )
            .with_program(b"third", accept());
        let view = ledger(&["first", "second", "third"]);
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let outcome = HookExecutor::new(&runtime, &config)
            .run_chain(&view, &otxn, &mut state, &request())
            .unwrap();
        assert!(outcome.accepted());
        assert_eq!(outcome.results.len(), 2);
        assert_eq!(outcome.results[1].exit_reason, b"new");
    }

    #[test]
    fn test_missing_definition_is_engine_error() {
        let runtime = NativeRuntime::new();
        let view = MemoryLedger::new(LedgerInfo::default(), Fees::default()).with_hooks(
            HOOK_ACCOUNT,
            vec![InstalledHook {
                hook_hash: Some([9; 32]),
                ..InstalledHook::default()
            }],
        );
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let err = HookExecutor::new(&runtime, &config)
            .run_chain(&view, &otxn, &mut state, &request())
            .unwrap_err();
        assert!(matches!(err, EngineError::Ledger(_)));
    }

    #[test]
    fn test_callback_gets_failure_flag() {
        let runtime = NativeRuntime::new().with_program(
            b"cb",
            NativeHook::new(|_| Ok(0)).with_callback(|g| {
                let code = g.argument() as i64;
                g.call(F::Accept, &[0, 0, code])?;
                Ok(0)
            }),
        );
        let view = ledger(&["cb"]);
        let config = EngineConfig::default();
        let otxn = OriginatingTxn::new(otxn_bytes());
        let mut state = HookStateMap::new();
        let result = HookExecutor::new(&runtime, &config)
            .run_callback(&view, &otxn, &mut state, &HOOK_ACCOUNT, &hook_hash(b"cb"), true)
            .unwrap();
        assert!(result.accepted());
        assert!(result.is_callback);
        assert_eq!(result.exit_code, 1);
    }
}
