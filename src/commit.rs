//! Applying a chain's results to the ledger.
//!
//! Nothing a hook does touches the ledger while it runs. Once the chain is
//! done the embedding node calls [`finalize_state`] for the shared state
//! map and [`finalize_result`] for each hook result, in execution order.

use crate::api::execution_flags;
use crate::config::EngineConfig;
use crate::context::HookResult;
use crate::ledger::{AccountId, Hash256, Keylet, LedgerStore};
use crate::state::HookStateMap;
use crate::sto::{sf, ObjectBuilder};
use crate::Result;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    #[error("Too many state changes: more than {0}")]
    TooManyStateModifications(u32),

    #[error("Account {0} cannot cover the reserve for a new state entry")]
    InsufficientReserve(String),

    #[error("State entry for missing account {0}")]
    MissingAccount(String),

    #[error("State data of {size} bytes exceeds the {limit} byte limit")]
    DataTooLarge { size: usize, limit: usize },
}

/// Write every modified cache entry back to the ledger. Returns the number
/// of entries written.
#[tracing::instrument(skip_all, fields(modified = map.modified_entry_count()))]
pub fn finalize_state(
    map: &HookStateMap,
    store: &mut dyn LedgerStore,
    config: &EngineConfig,
) -> Result<u32> {
    let limit = config.max_state_modifications.saturating_add(1);
    let mut changes = 0u32;
    for (id, namespace, key, data) in map.modified_entries() {
        changes += 1;
        if changes > limit {
            warn!(limit, "too many state changes");
            return Err(CommitError::TooManyStateModifications(limit).into());
        }
        set_hook_state(store, config, id, namespace, key, data)?;
    }
    info!(changes, "hook state committed");
    Ok(changes)
}

/// Create, replace or (for empty `data`) delete one state entry, keeping
/// the owning account's counters and namespace list in step.
fn set_hook_state(
    store: &mut dyn LedgerStore,
    config: &EngineConfig,
    id: &AccountId,
    namespace: &Hash256,
    key: &Hash256,
    data: &[u8],
) -> Result<()> {
    let mut root = store
        .account(id)
        .ok_or_else(|| CommitError::MissingAccount(hex::encode_upper(id)))?;
    if data.len() > config.max_state_data_size {
        return Err(CommitError::DataTooLarge {
            size: data.len(),
            limit: config.max_state_data_size,
        }
        .into());
    }
    let exists = store.hook_state(id, namespace, key).is_some();

    if data.is_empty() {
        // deleting an absent entry succeeds
        if !exists {
            return Ok(());
        }
        let namespace_removed = store.erase_hook_state(id, namespace, key)?;
        root.hook_state_count = root.hook_state_count.saturating_sub(1);
        root.owner_count = root.owner_count.saturating_sub(1);
        if namespace_removed {
            root.namespaces.retain(|ns| ns != namespace);
        }
        debug!(key = %hex::encode_upper(key), namespace_removed, "state entry deleted");
        return store.put_account(root);
    }

    if exists {
        return store.put_hook_state(id, namespace, key, data.to_vec());
    }

    let owner_count = root.owner_count.saturating_add(1);
    if root.balance < store.fees().account_reserve(owner_count) {
        warn!(account = %hex::encode_upper(id), owner_count, "insufficient reserve for state");
        return Err(CommitError::InsufficientReserve(hex::encode_upper(id)).into());
    }
    let new_namespace = !store.namespace_exists(id, namespace);
    store.put_hook_state(id, namespace, key, data.to_vec())?;
    root.owner_count = owner_count;
    root.hook_state_count = root.hook_state_count.saturating_add(1);
    if new_namespace && !root.namespaces.contains(namespace) {
        root.namespaces.push(*namespace);
    }
    store.put_account(root)
}

/// Metadata recorded for one hook execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HookExecution {
    pub result: u8,
    #[serde(with = "hex::serde")]
    pub account: AccountId,
    pub return_code: u64,
    #[serde(with = "hex::serde")]
    pub return_string: Vec<u8>,
    pub instruction_count: u64,
    pub emit_count: u16,
    pub execution_index: u16,
    pub state_change_count: u16,
    #[serde(with = "hex::serde")]
    pub hook_hash: Hash256,
    pub flags: u32,
}

impl HookExecution {
    /// Serialized as the body of a `HookExecution` object.
    pub fn to_sto(&self) -> Vec<u8> {
        ObjectBuilder::new()
            .u8(sf::HOOK_RESULT, self.result)
            .u16(sf::HOOK_STATE_CHANGE_COUNT, self.state_change_count)
            .u16(sf::HOOK_EMIT_COUNT, self.emit_count)
            .u16(sf::HOOK_EXECUTION_INDEX, self.execution_index)
            .u32(sf::FLAGS, self.flags)
            .u64(sf::HOOK_INSTRUCTION_COUNT, self.instruction_count)
            .u64(sf::HOOK_RETURN_CODE, self.return_code)
            .h256(sf::HOOK_HASH, &self.hook_hash)
            .vl(sf::HOOK_RETURN_STRING, &self.return_string)
            .account(sf::HOOK_ACCOUNT, &self.account)
            .build()
    }
}

/// Unsigned form of an exit code: negative codes keep their magnitude and
/// set the top bit.
pub fn encode_return_code(code: i64) -> u64 {
    if code >= 0 {
        code as u64
    } else {
        0x8000_0000_0000_0000 | code.unsigned_abs()
    }
}

pub fn execution_flags_of(result: &HookResult) -> u32 {
    let mut flags = 0;
    if result.is_strong {
        flags |= execution_flags::STRONG;
    }
    if result.is_callback {
        flags |= execution_flags::CALLBACK;
    }
    if result.execute_again_as_weak {
        flags |= execution_flags::AGAIN_AS_WEAK;
    }
    flags
}

/// Commit the result's emitted transactions (when `do_emit`) and build its
/// metadata record. Transactions already in the emitted directory are not
/// inserted or counted again.
#[tracing::instrument(
    skip_all,
    fields(hook = %hex::encode_upper(result.hook_hash), index = execution_index)
)]
pub fn finalize_result(
    result: &HookResult,
    store: &mut dyn LedgerStore,
    execution_index: u16,
    do_emit: bool,
) -> Result<HookExecution> {
    let mut emit_count: u16 = 0;
    if do_emit {
        for txn in &result.emitted {
            if store.read(&Keylet::emitted_txn(&txn.id)).is_some() {
                debug!(txid = %hex::encode_upper(txn.id), "already in emitted directory");
                continue;
            }
            store.insert_emitted(txn.id, txn.blob.clone())?;
            emit_count = emit_count.saturating_add(1);
        }
    }

    let execution = HookExecution {
        result: result.exit_type.code(),
        account: result.account,
        return_code: encode_return_code(result.exit_code),
        return_string: result.exit_reason.clone(),
        instruction_count: result.instruction_count,
        emit_count,
        execution_index,
        state_change_count: result.changed_state_count,
        hook_hash: result.hook_hash,
        flags: execution_flags_of(result),
    };
    info!(
        exit = %result.exit_type,
        return_code = execution.return_code,
        emitted = emit_count,
        "hook result committed"
    );
    Ok(execution)
}
