//! Hook state cache.
//!
//! One [`HookStateMap`] spans every hook executed for a single originating
//! transaction. Reads fall through to the ledger and are cached unmodified;
//! writes are cached as [`StateValue::Modified`] and only reach the ledger
//! through [`crate::commit::finalize_state`].
//!
//! Reserve accounting happens when an entry is first cached. Each account
//! gets an allotment of new entries derived from its spare balance, and
//! every check runs before the cache is touched so a rejected write leaves
//! no trace.

use crate::api::{ApiError, ApiResult};
use crate::config::EngineConfig;
use crate::ledger::{AccountId, Hash256, LedgerView};
use std::collections::BTreeMap;
use tracing::debug;

/// A cached state entry. Only `Modified` entries are written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateValue {
    Unmodified(Vec<u8>),
    Modified(Vec<u8>),
}

impl StateValue {
    pub fn data(&self) -> &[u8] {
        match self {
            StateValue::Unmodified(data) | StateValue::Modified(data) => data,
        }
    }

    pub fn is_modified(&self) -> bool {
        matches!(self, StateValue::Modified(_))
    }

    fn new(data: Vec<u8>, modified: bool) -> Self {
        if modified {
            StateValue::Modified(data)
        } else {
            StateValue::Unmodified(data)
        }
    }
}

pub type NamespaceEntries = BTreeMap<Hash256, StateValue>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountState {
    /// New entries the account can still pay reserve for.
    pub available: i64,
    pub namespace_count: u32,
    pub namespaces: BTreeMap<Hash256, NamespaceEntries>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HookStateMap {
    accounts: BTreeMap<AccountId, AccountState>,
    modified_entry_count: u32,
}

/// Left-pad a 1..=32 byte caller key to a full state key.
pub fn make_state_key(raw: &[u8]) -> Option<Hash256> {
    if raw.is_empty() || raw.len() > 32 {
        return None;
    }
    let mut key = [0u8; 32];
    key[32 - raw.len()..].copy_from_slice(raw);
    Some(key)
}

impl HookStateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn modified_entry_count(&self) -> u32 {
        self.modified_entry_count
    }

    pub fn account(&self, id: &AccountId) -> Option<&AccountState> {
        self.accounts.get(id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&AccountId, &AccountState)> {
        self.accounts.iter()
    }

    pub fn get(&self, id: &AccountId, namespace: &Hash256, key: &Hash256) -> Option<&StateValue> {
        self.accounts.get(id)?.namespaces.get(namespace)?.get(key)
    }

    /// Cached value, falling back to the ledger. A ledger hit is cached as
    /// unmodified.
    pub fn read(
        &mut self,
        view: &dyn LedgerView,
        config: &EngineConfig,
        id: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
    ) -> ApiResult<Vec<u8>> {
        if let Some(value) = self.get(id, namespace, key) {
            return Ok(value.data().to_vec());
        }
        let data = view
            .hook_state(id, namespace, key)
            .ok_or(ApiError::DoesntExist)?;
        self.set(view, config, id, namespace, key, data.clone(), false)
            .map_err(|_| ApiError::InternalError)?;
        Ok(data)
    }

    /// Insert or replace a cache entry, charging reserve when `modified`.
    ///
    /// Returns whether the write counts towards the executing hook's
    /// changed-state total.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &mut self,
        view: &dyn LedgerView,
        config: &EngineConfig,
        id: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
        data: Vec<u8>,
        modified: bool,
    ) -> ApiResult<bool> {
        if modified && self.modified_entry_count >= config.max_state_modifications {
            return Err(ApiError::TooManyStateModifications);
        }
        let create_namespace = !view.namespace_exists(id, namespace);

        let Some(account) = self.accounts.get_mut(id) else {
            let root = view.account(id).ok_or(ApiError::DoesntExist)?;
            let fees = view.fees();
            let spare = root.balance as i128 - fees.account_reserve(root.owner_count) as i128;
            let available = (spare / fees.increment.max(1) as i128) as i64;
            if available < 1 && modified {
                return Err(ApiError::ReserveInsufficient);
            }
            let mut namespace_count = root.namespaces.len() as u32;
            if create_namespace {
                namespace_count = namespace_count.checked_add(1).ok_or(ApiError::InternalError)?;
                if namespace_count > config.max_namespaces {
                    return Err(ApiError::TooManyNamespaces);
                }
            }
            self.modified_entry_count += 1;
            let mut entries = NamespaceEntries::new();
            entries.insert(*key, StateValue::new(data, modified));
            let mut namespaces = BTreeMap::new();
            namespaces.insert(*namespace, entries);
            self.accounts.insert(
                *id,
                AccountState {
                    available: available - 1,
                    namespace_count,
                    namespaces,
                },
            );
            debug!(account = %hex::encode_upper(id), available, "state account first touch");
            return Ok(false);
        };

        let can_reserve_new = account.available > 0;

        let Some(entries) = account.namespaces.get_mut(namespace) else {
            if modified {
                if !can_reserve_new {
                    return Err(ApiError::ReserveInsufficient);
                }
                if create_namespace {
                    let next = account
                        .namespace_count
                        .checked_add(1)
                        .ok_or(ApiError::InternalError)?;
                    if next > config.max_namespaces {
                        return Err(ApiError::TooManyNamespaces);
                    }
                    account.namespace_count = next;
                }
                account.available -= 1;
                self.modified_entry_count += 1;
            }
            let mut entries = NamespaceEntries::new();
            entries.insert(*key, StateValue::new(data, modified));
            account.namespaces.insert(*namespace, entries);
            return Ok(false);
        };

        let Some(existing) = entries.get_mut(key) else {
            if modified {
                if !can_reserve_new {
                    return Err(ApiError::ReserveInsufficient);
                }
                account.available -= 1;
                self.modified_entry_count += 1;
            }
            entries.insert(*key, StateValue::new(data, modified));
            return Ok(modified);
        };

        if !modified {
            let keep_flag = existing.is_modified();
            *existing = StateValue::new(data, keep_flag);
            return Ok(false);
        }
        let first_change = !existing.is_modified();
        self.modified_entry_count += 1;
        *existing = StateValue::Modified(data);
        Ok(first_change)
    }

    /// Every modified entry, grouped by account and namespace.
    pub fn modified_entries(
        &self,
    ) -> impl Iterator<Item = (&AccountId, &Hash256, &Hash256, &[u8])> {
        self.accounts.iter().flat_map(|(id, account)| {
            account.namespaces.iter().flat_map(move |(ns, entries)| {
                entries
                    .iter()
                    .filter(|(_, value)| value.is_modified())
                    .map(move |(key, value)| (id, ns, key, value.data()))
            })
        })
    }
}

/// Whether the hook `hook_hash` running on `writer` may write `namespace`
/// of `owner`'s state. The owner must have installed a hook whose
/// namespace is `namespace` and which grants the writer's hook hash,
/// optionally restricted to a single authorized account.
///
/// `None` when the owner has no hooks at all.
pub fn grant_permits(
    view: &dyn LedgerView,
    owner: &AccountId,
    namespace: &Hash256,
    hook_hash: &Hash256,
    writer: &AccountId,
) -> Option<bool> {
    let hooks = view.hooks(owner)?;
    for hook in &hooks {
        let Some(installed_hash) = hook.hook_hash else {
            continue;
        };
        if hook.grants.is_empty() {
            continue;
        }
        let hook_namespace = match hook.namespace {
            Some(ns) => ns,
            None => match view.hook_definition(&installed_hash) {
                Some(definition) => definition.namespace,
                None => continue,
            },
        };
        if hook_namespace != *namespace {
            continue;
        }
        let granted = hook.grants.iter().any(|grant| {
            grant.hook_hash == *hook_hash
                && grant.authorize.map_or(true, |allowed| allowed == *writer)
        });
        if granted {
            return Some(true);
        }
    }
    Some(false)
}
