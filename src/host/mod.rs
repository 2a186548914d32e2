//! Host functions: everything guest code can call.
//!
//! Sub-modules group the functions by concern:
//! - [`control`]: exits, guards, chain position, parameters and skips.
//! - [`util`]: hashing, addresses, signatures, keylets, `sto_*`.
//! - [`slots`]: slot loading and navigation.
//! - [`state`]: hook state reads and writes.
//! - [`float`]: XFL arithmetic and amount conversion.
//! - [`emission`]: reservation, nonces, details and `emit`.
//! - [`ledger`]: ledger header values, nonces and range lookups.
//! - [`otxn`]: the originating transaction.
//! - [`trace`]: guest logging.
//!
//! [`HookContext::call`] is the single entry point a guest runtime uses.
//! It flattens every [`crate::api::ApiResult`] into the `i64` the guest
//! receives, and reports [`Terminated`] once the hook has exited.

mod control;
mod emission;
mod float;
mod ledger;
mod otxn;
mod slots;
mod state;
mod trace;
mod util;

use crate::api::{to_return_value, ExitType};
use crate::context::HookContext;
use crate::memory::GuestMemory;
use thiserror::Error;
use tracing::{debug, warn};

/// The guest must stop running: the hook has exited.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("hook execution terminated with {0}")]
pub struct Terminated(pub ExitType);

/// What a host call hands back to the guest runtime.
pub type HostResult = std::result::Result<i64, Terminated>;

/// Every host function, by import name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostFunction {
    Guard,
    Accept,
    Rollback,
    UtilRaddr,
    UtilAccid,
    UtilVerify,
    UtilSha512h,
    UtilKeylet,
    StoSubfield,
    StoSubarray,
    StoEmplace,
    StoErase,
    StoValidate,
    EtxnBurden,
    EtxnDetails,
    EtxnFeeBase,
    EtxnReserve,
    EtxnGeneration,
    EtxnNonce,
    Emit,
    FloatSet,
    FloatMultiply,
    FloatMulratio,
    FloatNegate,
    FloatCompare,
    FloatSum,
    FloatSto,
    FloatStoSet,
    FloatInvert,
    FloatDivide,
    FloatOne,
    FloatMantissa,
    FloatSign,
    FloatInt,
    FloatLog,
    FloatRoot,
    FeeBase,
    LedgerSeq,
    LedgerLastHash,
    LedgerLastTime,
    LedgerNonce,
    LedgerKeylet,
    HookAccount,
    HookHash,
    HookParamSet,
    HookParam,
    HookAgain,
    HookSkip,
    HookPos,
    Slot,
    SlotClear,
    SlotCount,
    SlotSet,
    SlotSize,
    SlotSubarray,
    SlotSubfield,
    SlotType,
    SlotFloat,
    StateSet,
    StateForeignSet,
    State,
    StateForeign,
    Trace,
    TraceNum,
    TraceFloat,
    OtxnBurden,
    OtxnField,
    OtxnGeneration,
    OtxnId,
    OtxnType,
    OtxnSlot,
    OtxnParam,
    MetaSlot,
    XpopSlot,
}

/// Import name in module `env` and parameter count, in declaration order.
const IMPORTS: &[(HostFunction, &str, usize)] = &[
    (HostFunction::Guard, "_g", 2),
    (HostFunction::Accept, "accept", 3),
    (HostFunction::Rollback, "rollback", 3),
    (HostFunction::UtilRaddr, "util_raddr", 4),
    (HostFunction::UtilAccid, "util_accid", 4),
    (HostFunction::UtilVerify, "util_verify", 6),
    (HostFunction::UtilSha512h, "util_sha512h", 4),
    (HostFunction::UtilKeylet, "util_keylet", 9),
    (HostFunction::StoSubfield, "sto_subfield", 3),
    (HostFunction::StoSubarray, "sto_subarray", 3),
    (HostFunction::StoEmplace, "sto_emplace", 7),
    (HostFunction::StoErase, "sto_erase", 5),
    (HostFunction::StoValidate, "sto_validate", 2),
    (HostFunction::EtxnBurden, "etxn_burden", 0),
    (HostFunction::EtxnDetails, "etxn_details", 2),
    (HostFunction::EtxnFeeBase, "etxn_fee_base", 2),
    (HostFunction::EtxnReserve, "etxn_reserve", 1),
    (HostFunction::EtxnGeneration, "etxn_generation", 0),
    (HostFunction::EtxnNonce, "etxn_nonce", 2),
    (HostFunction::Emit, "emit", 4),
    (HostFunction::FloatSet, "float_set", 2),
    (HostFunction::FloatMultiply, "float_multiply", 2),
    (HostFunction::FloatMulratio, "float_mulratio", 4),
    (HostFunction::FloatNegate, "float_negate", 1),
    (HostFunction::FloatCompare, "float_compare", 3),
    (HostFunction::FloatSum, "float_sum", 2),
    (HostFunction::FloatSto, "float_sto", 8),
    (HostFunction::FloatStoSet, "float_sto_set", 2),
    (HostFunction::FloatInvert, "float_invert", 1),
    (HostFunction::FloatDivide, "float_divide", 2),
    (HostFunction::FloatOne, "float_one", 0),
    (HostFunction::FloatMantissa, "float_mantissa", 1),
    (HostFunction::FloatSign, "float_sign", 1),
    (HostFunction::FloatInt, "float_int", 3),
    (HostFunction::FloatLog, "float_log", 1),
    (HostFunction::FloatRoot, "float_root", 2),
    (HostFunction::FeeBase, "fee_base", 0),
    (HostFunction::LedgerSeq, "ledger_seq", 0),
    (HostFunction::LedgerLastHash, "ledger_last_hash", 2),
    (HostFunction::LedgerLastTime, "ledger_last_time", 0),
    (HostFunction::LedgerNonce, "ledger_nonce", 2),
    (HostFunction::LedgerKeylet, "ledger_keylet", 6),
    (HostFunction::HookAccount, "hook_account", 2),
    (HostFunction::HookHash, "hook_hash", 3),
    (HostFunction::HookParamSet, "hook_param_set", 6),
    (HostFunction::HookParam, "hook_param", 4),
    (HostFunction::HookAgain, "hook_again", 0),
    (HostFunction::HookSkip, "hook_skip", 3),
    (HostFunction::HookPos, "hook_pos", 0),
    (HostFunction::Slot, "slot", 3),
    (HostFunction::SlotClear, "slot_clear", 1),
    (HostFunction::SlotCount, "slot_count", 1),
    (HostFunction::SlotSet, "slot_set", 3),
    (HostFunction::SlotSize, "slot_size", 1),
    (HostFunction::SlotSubarray, "slot_subarray", 3),
    (HostFunction::SlotSubfield, "slot_subfield", 3),
    (HostFunction::SlotType, "slot_type", 2),
    (HostFunction::SlotFloat, "slot_float", 1),
    (HostFunction::StateSet, "state_set", 4),
    (HostFunction::StateForeignSet, "state_foreign_set", 8),
    (HostFunction::State, "state", 4),
    (HostFunction::StateForeign, "state_foreign", 8),
    (HostFunction::Trace, "trace", 5),
    (HostFunction::TraceNum, "trace_num", 3),
    (HostFunction::TraceFloat, "trace_float", 3),
    (HostFunction::OtxnBurden, "otxn_burden", 0),
    (HostFunction::OtxnField, "otxn_field", 3),
    (HostFunction::OtxnGeneration, "otxn_generation", 0),
    (HostFunction::OtxnId, "otxn_id", 3),
    (HostFunction::OtxnType, "otxn_type", 0),
    (HostFunction::OtxnSlot, "otxn_slot", 1),
    (HostFunction::OtxnParam, "otxn_param", 4),
    (HostFunction::MetaSlot, "meta_slot", 1),
    (HostFunction::XpopSlot, "xpop_slot", 2),
];

impl HostFunction {
    pub fn all() -> impl Iterator<Item = HostFunction> {
        IMPORTS.iter().map(|(function, _, _)| *function)
    }

    /// Import name in module `env`.
    pub fn name(self) -> &'static str {
        IMPORTS[self as usize].1
    }

    /// Number of parameters the import takes.
    pub fn arity(self) -> usize {
        IMPORTS[self as usize].2
    }

    pub fn from_name(name: &str) -> Option<Self> {
        IMPORTS
            .iter()
            .find(|(_, import, _)| *import == name)
            .map(|(function, _, _)| *function)
    }
}

/// Positional access to raw call arguments. Pointers and lengths arrive
/// as `u32`, floats and exit codes as `i64`.
#[derive(Clone, Copy)]
struct Args<'a>(&'a [i64]);

impl Args<'_> {
    fn u32(&self, i: usize) -> u32 {
        self.0[i] as u32
    }

    fn i32(&self, i: usize) -> i32 {
        self.0[i] as i32
    }

    fn i64(&self, i: usize) -> i64 {
        self.0[i]
    }
}

impl HookContext<'_> {
    /// Run one host function against the guest's linear memory.
    pub fn call(&mut self, memory: &mut [u8], function: HostFunction, args: &[i64]) -> HostResult {
        if self.terminated {
            return Err(Terminated(self.result.exit_type));
        }
        if args.len() != function.arity() {
            warn!(
                function = function.name(),
                expected = function.arity(),
                got = args.len(),
                "host call with wrong arity"
            );
            self.exit(ExitType::WasmError, Vec::new(), -1);
            return Err(Terminated(ExitType::WasmError));
        }

        let mut mem = GuestMemory::new(memory);
        let a = Args(args);
        use HostFunction as F;
        let result = match function {
            F::Guard => return self.guard(a.u32(0), a.u32(1)),
            F::Accept => return self.hook_exit(&mem, a.u32(0), a.u32(1), a.i64(2), ExitType::Accept),
            F::Rollback => {
                return self.hook_exit(&mem, a.u32(0), a.u32(1), a.i64(2), ExitType::Rollback)
            }

            F::UtilRaddr => self.util_raddr(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),
            F::UtilAccid => self.util_accid(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),
            F::UtilVerify => self.util_verify(
                &mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
            ),
            F::UtilSha512h => self.util_sha512h(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),
            F::UtilKeylet => self.util_keylet(
                &mut mem,
                a.u32(0),
                a.u32(1),
                a.u32(2),
                [a.u32(3), a.u32(4), a.u32(5), a.u32(6), a.u32(7), a.u32(8)],
            ),
            F::StoSubfield => self.sto_subfield(&mem, a.u32(0), a.u32(1), a.u32(2)),
            F::StoSubarray => self.sto_subarray(&mem, a.u32(0), a.u32(1), a.u32(2)),
            F::StoEmplace => self.sto_emplace(
                &mut mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
                a.u32(6),
            ),
            F::StoErase => self.sto_erase(&mut mem, (a.u32(0), a.u32(1)), (a.u32(2), a.u32(3)), a.u32(4)),
            F::StoValidate => self.sto_validate(&mem, a.u32(0), a.u32(1)),

            F::EtxnBurden => self.etxn_burden(),
            F::EtxnDetails => self.etxn_details(&mut mem, a.u32(0), a.u32(1)),
            F::EtxnFeeBase => self.etxn_fee_base(&mem, a.u32(0), a.u32(1)),
            F::EtxnReserve => self.etxn_reserve(a.u32(0)),
            F::EtxnGeneration => self.etxn_generation(),
            F::EtxnNonce => self.etxn_nonce(&mut mem, a.u32(0), a.u32(1)),
            F::Emit => self.emit(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),

            F::FloatSet => self.float_set(a.i32(0), a.i64(1)),
            F::FloatMultiply => crate::xfl::multiply(a.i64(0), a.i64(1)),
            F::FloatMulratio => {
                crate::xfl::mulratio(a.i64(0), a.u32(1) != 0, a.u32(2), a.u32(3))
            }
            F::FloatNegate => crate::xfl::negate(a.i64(0)),
            F::FloatCompare => crate::xfl::compare(a.i64(0), a.i64(1), a.u32(2)),
            F::FloatSum => crate::xfl::sum(a.i64(0), a.i64(1)),
            F::FloatSto => self.float_sto(
                &mut mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
                a.i64(6),
                a.u32(7),
            ),
            F::FloatStoSet => self.float_sto_set(&mem, a.u32(0), a.u32(1)),
            F::FloatInvert => crate::xfl::invert(a.i64(0)),
            F::FloatDivide => crate::xfl::divide(a.i64(0), a.i64(1)),
            F::FloatOne => Ok(crate::xfl::ONE),
            F::FloatMantissa => crate::xfl::mantissa(a.i64(0)),
            F::FloatSign => crate::xfl::sign(a.i64(0)),
            F::FloatInt => crate::xfl::int(a.i64(0), a.u32(1), a.u32(2) != 0),
            F::FloatLog => crate::xfl::log(a.i64(0)),
            F::FloatRoot => crate::xfl::root(a.i64(0), a.u32(1)),

            F::FeeBase => self.fee_base(),
            F::LedgerSeq => Ok(self.view.info().seq as i64),
            F::LedgerLastHash => self.ledger_last_hash(&mut mem, a.u32(0), a.u32(1)),
            F::LedgerLastTime => Ok(self.view.info().parent_close_time as i64),
            F::LedgerNonce => self.ledger_nonce(&mut mem, a.u32(0), a.u32(1)),
            F::LedgerKeylet => self.ledger_keylet(
                &mut mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
            ),

            F::HookAccount => self.hook_account(&mut mem, a.u32(0), a.u32(1)),
            F::HookHash => self.hook_hash(&mut mem, a.u32(0), a.u32(1), a.i32(2)),
            F::HookParamSet => self.hook_param_set(
                &mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
            ),
            F::HookParam => self.hook_param(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),
            F::HookAgain => self.hook_again(),
            F::HookSkip => self.hook_skip(&mem, a.u32(0), a.u32(1), a.u32(2)),
            F::HookPos => Ok(self.result.chain_position as i64),

            F::Slot => self.slot(&mut mem, a.u32(0), a.u32(1), a.u32(2)),
            F::SlotClear => self.slots.clear(a.u32(0)),
            F::SlotCount => self.slots.count(a.u32(0)),
            F::SlotSet => self.slot_set(&mem, a.u32(0), a.u32(1), a.u32(2)),
            F::SlotSize => self.slots.size(a.u32(0)),
            F::SlotSubarray => self.slots.subarray(a.u32(0), a.u32(1), a.u32(2)),
            F::SlotSubfield => self.slots.subfield(a.u32(0), a.u32(1), a.u32(2)),
            F::SlotType => self.slots.slot_type(a.u32(0), a.u32(1)),
            F::SlotFloat => self.slots.float(a.u32(0)),

            F::StateSet => self.state_foreign_set(
                &mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (0, 0),
                (0, 0),
            ),
            F::StateForeignSet => self.state_foreign_set(
                &mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
                (a.u32(6), a.u32(7)),
            ),
            F::State => self.state_foreign(
                &mut mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (0, 0),
                (0, 0),
            ),
            F::StateForeign => self.state_foreign(
                &mut mem,
                (a.u32(0), a.u32(1)),
                (a.u32(2), a.u32(3)),
                (a.u32(4), a.u32(5)),
                (a.u32(6), a.u32(7)),
            ),

            F::Trace => self.trace(&mem, (a.u32(0), a.u32(1)), (a.u32(2), a.u32(3)), a.u32(4) != 0),
            F::TraceNum => self.trace_num(&mem, a.u32(0), a.u32(1), a.i64(2)),
            F::TraceFloat => self.trace_float(&mem, a.u32(0), a.u32(1), a.i64(2)),

            F::OtxnBurden => Ok(self.emit.otxn_burden(self.otxn.visible()) as i64),
            F::OtxnField => self.otxn_field(&mut mem, a.u32(0), a.u32(1), a.u32(2)),
            F::OtxnGeneration => Ok(self.emit.otxn_generation(self.otxn.visible()) as i64),
            F::OtxnId => self.otxn_id(&mut mem, a.u32(0), a.u32(1), a.u32(2)),
            F::OtxnType => self.otxn_type(),
            F::OtxnSlot => self.otxn_slot(a.u32(0)),
            F::OtxnParam => self.otxn_param(&mut mem, a.u32(0), a.u32(1), a.u32(2), a.u32(3)),
            F::MetaSlot => self.meta_slot(a.u32(0)),
            F::XpopSlot => self.xpop_slot(a.u32(0), a.u32(1)),
        };

        let value = to_return_value(result);
        debug!(function = function.name(), value, "host call");
        Ok(value)
    }

    /// Dispatch by import name. Unknown names trap the guest.
    pub fn call_by_name(&mut self, memory: &mut [u8], name: &str, args: &[i64]) -> HostResult {
        match HostFunction::from_name(name) {
            Some(function) => self.call(memory, function, args),
            None => {
                warn!(name, "call to unknown host function");
                self.exit(ExitType::WasmError, Vec::new(), -1);
                Err(Terminated(ExitType::WasmError))
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for (index, function) in HostFunction::all().enumerate() {
            assert_eq!(function as usize, index);
            assert_eq!(HostFunction::from_name(function.name()), Some(function));
        }
        assert_eq!(HostFunction::XpopSlot as usize, IMPORTS.len() - 1);
        assert_eq!(HostFunction::from_name("hook"), None);
        assert_eq!(HostFunction::Guard.arity(), 2);
        assert_eq!(HostFunction::UtilKeylet.arity(), 9);
    }

    #[test]
    fn test_wrong_arity_traps() {
        let mut fx = testing::Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 64];
        let err = ctx.call(&mut mem, HostFunction::LedgerSeq, &[1]).unwrap_err();
        assert_eq!(err, Terminated(ExitType::WasmError));
        assert_eq!(ctx.result.exit_type, ExitType::WasmError);
    }

    #[test]
    fn test_calls_after_exit_rejected() {
        let mut fx = testing::Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 64];
        assert_eq!(ctx.call(&mut mem, HostFunction::LedgerSeq, &[]), Ok(100));
        let err = ctx.call(&mut mem, HostFunction::Accept, &[0, 0, 0]).unwrap_err();
        assert_eq!(err, Terminated(ExitType::Accept));
        assert_eq!(
            ctx.call(&mut mem, HostFunction::LedgerSeq, &[]),
            Err(Terminated(ExitType::Accept))
        );
    }

    #[test]
    fn test_unknown_name_traps() {
        let mut fx = testing::Fixture::new();
        let setup = fx.setup();
        let mut ctx = fx.context(setup);
        let mut mem = vec![0u8; 64];
        assert!(ctx.call_by_name(&mut mem, "no_such_fn", &[]).is_err());
        // the failed lookup ended the run
        assert!(ctx.call_by_name(&mut mem, "hook_pos", &[]).is_err());
    }
}
