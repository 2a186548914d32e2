//! Chain outcomes and fee helpers.

use crate::context::HookResult;
use crate::ledger::Hash256;
use serde::Serialize;

/// Drops charged per byte of hook bytecode at creation.
const CREATION_FEE_PER_BYTE: i64 = 500;

/// Fee in drops for executing `instructions` guest instructions.
pub fn execution_fee(instructions: u64) -> i64 {
    i64::try_from(instructions).unwrap_or(i64::MAX)
}

/// Fee in drops for installing `bytes` of hook bytecode.
pub fn creation_fee(bytes: u64) -> i64 {
    i64::try_from(bytes)
        .ok()
        .and_then(|bytes| bytes.checked_mul(CREATION_FEE_PER_BYTE))
        .unwrap_or(i64::MAX)
}

/// Everything one chain run produced, in execution order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChainOutcome {
    pub results: Vec<HookResult>,
}

impl ChainOutcome {
    /// True when every hook that ran accepted. An empty chain accepts.
    pub fn accepted(&self) -> bool {
        self.results.iter().all(HookResult::accepted)
    }

    /// The result that stopped the chain, if one did.
    pub fn rejection(&self) -> Option<&HookResult> {
        self.results.iter().find(|result| !result.accepted())
    }

    /// Hooks that asked to run again as weak once the transaction applies.
    pub fn again_as_weak(&self) -> impl Iterator<Item = &Hash256> {
        self.results
            .iter()
            .filter(|result| result.execute_again_as_weak)
            .map(|result| &result.hook_hash)
    }

    pub fn instruction_count(&self) -> u64 {
        self.results
            .iter()
            .fold(0u64, |total, result| total.saturating_add(result.instruction_count))
    }

    pub fn emitted_count(&self) -> usize {
        self.results.iter().map(|result| result.emitted.len()).sum()
    }
}
