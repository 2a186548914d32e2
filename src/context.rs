//! Execution state for one hook invocation.
//!
//! [`HookContext`] lives for exactly one run of one hook. It owns the slot
//! table, guard counters and emission bookkeeping, borrows the shared
//! [`HookStateMap`] for the chain, and accumulates everything the caller
//! needs afterwards in a [`HookResult`], which outlives the context.

use crate::api::ExitType;
use crate::config::EngineConfig;
use crate::emit::{transaction_id, EmitOrigin, EmitState, EmittedTxn};
use crate::guard::GuardMap;
use crate::ledger::{AccountId, Hash256, LedgerView};
use crate::slot::SlotTable;
use crate::state::HookStateMap;
use crate::sto::{sf, ObjectView};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Parameter name to value.
pub type HookParams = BTreeMap<Vec<u8>, Vec<u8>>;
/// Parameter overrides keyed by the hook hash they target.
pub type ParamOverrides = BTreeMap<Hash256, HookParams>;

/// The transaction whose application triggered the hook chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginatingTxn {
    pub id: Hash256,
    pub bytes: Vec<u8>,
    /// When the chain runs because an emitted transaction failed, the
    /// failed transaction. Hooks then see it instead of `bytes`.
    pub emit_failure: Option<Vec<u8>>,
}

impl OriginatingTxn {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            id: transaction_id(&bytes),
            bytes,
            emit_failure: None,
        }
    }

    pub fn with_emit_failure(mut self, failed: Vec<u8>) -> Self {
        self.emit_failure = Some(failed);
        self
    }

    /// The transaction hooks observe.
    pub fn visible(&self) -> &[u8] {
        self.emit_failure.as_deref().unwrap_or(&self.bytes)
    }

    /// Id reported by `otxn_id`; `canonical` forces the applying
    /// transaction's own id during an emit-failure callback.
    pub fn visible_id(&self, canonical: bool) -> Hash256 {
        match &self.emit_failure {
            Some(failed) if !canonical => transaction_id(failed),
            _ => self.id,
        }
    }

    pub fn account(&self) -> Option<AccountId> {
        ObjectView::parse(&self.bytes)?.account(sf::ACCOUNT)
    }

    pub fn txn_type(&self) -> Option<u16> {
        ObjectView::parse(self.visible())?.u16(sf::TRANSACTION_TYPE)
    }
}

/// Everything known about a hook before it runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookSetup {
    pub account: AccountId,
    pub hook_hash: Hash256,
    pub namespace: Hash256,
    /// Definition parameters merged with the installation's overrides.
    pub params: HookParams,
    /// Overrides set by hooks earlier in the chain.
    pub param_overrides: ParamOverrides,
    pub chain_position: u32,
    pub is_strong: bool,
    pub is_callback: bool,
    /// The hook exports `cbak`.
    pub has_callback: bool,
    /// Argument handed to `hook` / `cbak`.
    pub wasm_param: u32,
    /// Metadata of the applied transaction, available to weak executions.
    pub provisional_meta: Option<Vec<u8>>,
}

/// Accumulated outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookResult {
    #[serde(with = "hex::serde")]
    pub hook_hash: Hash256,
    #[serde(with = "hex::serde")]
    pub account: AccountId,
    #[serde(with = "hex::serde")]
    pub otxn_account: AccountId,
    #[serde(with = "hex::serde")]
    pub namespace: Hash256,
    #[serde(skip)]
    pub emitted: Vec<EmittedTxn>,
    pub changed_state_count: u16,
    #[serde(skip)]
    pub param_overrides: ParamOverrides,
    #[serde(skip)]
    pub params: HookParams,
    #[serde(skip)]
    pub skips: BTreeSet<Hash256>,
    pub exit_type: ExitType,
    #[serde(with = "hex::serde")]
    pub exit_reason: Vec<u8>,
    pub exit_code: i64,
    pub instruction_count: u64,
    pub has_callback: bool,
    pub is_callback: bool,
    pub is_strong: bool,
    pub wasm_param: u32,
    pub override_count: u32,
    pub chain_position: u32,
    pub foreign_state_set_disabled: bool,
    pub execute_again_as_weak: bool,
}

impl HookResult {
    pub fn new(setup: &HookSetup, otxn_account: AccountId) -> Self {
        Self {
            hook_hash: setup.hook_hash,
            account: setup.account,
            otxn_account,
            namespace: setup.namespace,
            emitted: Vec::new(),
            changed_state_count: 0,
            param_overrides: setup.param_overrides.clone(),
            params: setup.params.clone(),
            skips: BTreeSet::new(),
            exit_type: ExitType::Rollback,
            exit_reason: Vec::new(),
            exit_code: -1,
            instruction_count: 0,
            has_callback: setup.has_callback,
            is_callback: setup.is_callback,
            is_strong: setup.is_strong,
            wasm_param: setup.wasm_param,
            override_count: 0,
            chain_position: setup.chain_position,
            foreign_state_set_disabled: false,
            execute_again_as_weak: false,
        }
    }

    pub fn accepted(&self) -> bool {
        self.exit_type.is_accept()
    }

    pub fn exit_reason_lossy(&self) -> String {
        String::from_utf8_lossy(&self.exit_reason).into_owned()
    }
}

fn origin_of<'b>(result: &'b HookResult, otxn: &'b OriginatingTxn) -> EmitOrigin<'b> {
    let mut nonce_flags = result.chain_position << 2;
    if result.is_strong {
        nonce_flags |= 0b10;
    }
    if result.is_callback {
        nonce_flags |= 0b01;
    }
    EmitOrigin {
        account: &result.account,
        hook_hash: &result.hook_hash,
        otxn_id: &otxn.id,
        otxn: otxn.visible(),
        nonce_flags,
        has_callback: result.has_callback,
    }
}

/// Mutable state of one running hook.
pub struct HookContext<'a> {
    pub(crate) view: &'a dyn LedgerView,
    pub(crate) config: &'a EngineConfig,
    pub(crate) otxn: &'a OriginatingTxn,
    pub(crate) state: &'a mut HookStateMap,
    pub(crate) provisional_meta: Option<Vec<u8>>,
    pub(crate) slots: SlotTable,
    pub(crate) guards: GuardMap,
    pub(crate) emit: EmitState,
    pub(crate) ledger_nonce_counter: u32,
    pub(crate) terminated: bool,
    pub result: HookResult,
}

impl<'a> HookContext<'a> {
    pub fn new(
        view: &'a dyn LedgerView,
        config: &'a EngineConfig,
        otxn: &'a OriginatingTxn,
        state: &'a mut HookStateMap,
        setup: HookSetup,
    ) -> Self {
        let otxn_account = otxn.account().unwrap_or_default();
        let result = HookResult::new(&setup, otxn_account);
        Self {
            view,
            config,
            otxn,
            state,
            provisional_meta: setup.provisional_meta,
            slots: SlotTable::new(config.max_slots),
            guards: GuardMap::new(),
            emit: EmitState::new(),
            ledger_nonce_counter: 0,
            terminated: false,
            result,
        }
    }

    /// True once `accept`, `rollback` or a guard violation ended the run.
    pub fn terminated(&self) -> bool {
        self.terminated
    }

    /// Record the exit and stop accepting host calls.
    pub(crate) fn exit(&mut self, exit_type: ExitType, reason: Vec<u8>, code: i64) {
        self.result.exit_type = exit_type;
        self.result.exit_reason = reason;
        self.result.exit_code = code;
        self.terminated = true;
    }

    pub(crate) fn emit_origin(&self) -> EmitOrigin<'_> {
        origin_of(&self.result, self.otxn)
    }

    /// Split borrow of the emission state and the origin it needs.
    pub(crate) fn emit_parts(&mut self) -> (&mut EmitState, EmitOrigin<'_>) {
        (&mut self.emit, origin_of(&self.result, self.otxn))
    }

    /// Hand the result back. Slots, guards and emission bookkeeping go
    /// with the context.
    pub fn finish(self) -> HookResult {
        self.result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Fees, LedgerInfo, MemoryLedger};
    use crate::sto::ObjectBuilder;

    fn otxn() -> OriginatingTxn {
        OriginatingTxn::new(
            ObjectBuilder::new()
                .u16(sf::TRANSACTION_TYPE, 0)
                .account(sf::ACCOUNT, &[7; 20])
                .build(),
        )
    }

    #[test]
    fn test_result_starts_as_rollback() {
        let setup = HookSetup {
            hook_hash: [1; 32],
            chain_position: 2,
            is_strong: true,
            ..HookSetup::default()
        };
        let result = HookResult::new(&setup, [7; 20]);
        assert_eq!(result.exit_type, ExitType::Rollback);
        assert_eq!(result.exit_code, -1);
        assert!(!result.accepted());
        assert_eq!(result.chain_position, 2);
    }

    #[test]
    fn test_emit_failure_changes_visible_txn() {
        let failed = ObjectBuilder::new().u16(sf::TRANSACTION_TYPE, 3).build();
        let plain = otxn();
        assert_eq!(plain.txn_type(), Some(0));
        assert_eq!(plain.visible_id(false), plain.id);

        let callback = otxn().with_emit_failure(failed.clone());
        assert_eq!(callback.txn_type(), Some(3));
        assert_eq!(callback.visible_id(false), transaction_id(&failed));
        assert_eq!(callback.visible_id(true), callback.id);
        assert_eq!(callback.account(), Some([7; 20]));
    }

    #[test]
    fn test_nonce_flags_encode_position() {
        let view = MemoryLedger::new(LedgerInfo::default(), Fees::default());
        let config = EngineConfig::default();
        let otxn = otxn();
        let mut state = HookStateMap::new();
        let setup = HookSetup {
            chain_position: 3,
            is_strong: true,
            is_callback: true,
            ..HookSetup::default()
        };
        let mut ctx = HookContext::new(&view, &config, &otxn, &mut state, setup);
        assert_eq!(ctx.emit_origin().nonce_flags, (3 << 2) | 0b11);
        assert_eq!(ctx.result.otxn_account, [7; 20]);
        ctx.exit(ExitType::Accept, b"ok".to_vec(), 0);
        assert!(ctx.terminated());
        assert!(ctx.finish().accepted());
    }
}
