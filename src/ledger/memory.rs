//! In-memory ledger used by tests, benches and the CLI.

use super::keylet::{entry_type, Keylet};
use super::{
    AccountId, AccountRoot, Fees, Hash256, HookDefinition, InstalledHook, LedgerInfo,
    LedgerStore, LedgerView,
};
use crate::sto::{sf, ObjectBuilder};
use crate::{EngineError, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    info: LedgerInfo,
    fees: Fees,
    accounts: BTreeMap<AccountId, AccountRoot>,
    hooks: BTreeMap<AccountId, Vec<InstalledHook>>,
    definitions: BTreeMap<Hash256, HookDefinition>,
    state: BTreeMap<(AccountId, Hash256), BTreeMap<Hash256, Vec<u8>>>,
    transactions: BTreeMap<Hash256, Vec<u8>>,
    emitted: BTreeMap<Hash256, Vec<u8>>,
    /// Every entry by key, serialized. Backs `read` and `successor`.
    entries: BTreeMap<Hash256, (u16, Vec<u8>)>,
    rejected: BTreeSet<Vec<u8>>,
}

impl MemoryLedger {
    pub fn new(info: LedgerInfo, fees: Fees) -> Self {
        Self {
            info,
            fees,
            ..Self::default()
        }
    }

    pub fn set_info(&mut self, info: LedgerInfo) {
        self.info = info;
    }

    pub fn with_account(mut self, root: AccountRoot) -> Self {
        self.store_account(root);
        self
    }

    pub fn with_hooks(mut self, id: AccountId, hooks: Vec<InstalledHook>) -> Self {
        self.set_hooks(id, hooks);
        self
    }

    pub fn with_definition(mut self, definition: HookDefinition) -> Self {
        let keylet = Keylet::hook_definition(&definition.hook_hash);
        let entry = ObjectBuilder::new()
            .u16(sf::LEDGER_ENTRY_TYPE, entry_type::HOOK_DEFINITION)
            .h256(sf::HOOK_HASH, &definition.hook_hash)
            .h256(sf::HOOK_NAMESPACE, &definition.namespace)
            .vl(sf::CREATE_CODE, &definition.code)
            .build();
        self.insert_entry(keylet, entry);
        self.definitions.insert(definition.hook_hash, definition);
        self
    }

    pub fn with_transaction(mut self, id: Hash256, txn: Vec<u8>) -> Self {
        self.transactions.insert(id, txn);
        self
    }

    /// Seed a state entry without going through the commit path.
    pub fn with_state(
        mut self,
        id: AccountId,
        namespace: Hash256,
        key: Hash256,
        data: Vec<u8>,
    ) -> Self {
        self.write_state(&id, &namespace, &key, data);
        self
    }

    /// Transactions whose bytes equal `txn` fail preflight.
    pub fn reject_in_preflight(&mut self, txn: Vec<u8>) {
        self.rejected.insert(txn);
    }

    pub fn insert_entry(&mut self, keylet: Keylet, bytes: Vec<u8>) {
        self.entries.insert(keylet.key, (keylet.entry_type, bytes));
    }

    pub fn set_hooks(&mut self, id: AccountId, hooks: Vec<InstalledHook>) {
        let elements = hooks
            .iter()
            .map(|hook| {
                let mut obj = ObjectBuilder::new();
                if let Some(hash) = &hook.hook_hash {
                    obj = obj.h256(sf::HOOK_HASH, hash);
                }
                if let Some(ns) = &hook.namespace {
                    obj = obj.h256(sf::HOOK_NAMESPACE, ns);
                }
                (sf::HOOK, obj)
            })
            .collect();
        let entry = ObjectBuilder::new()
            .u16(sf::LEDGER_ENTRY_TYPE, entry_type::HOOK)
            .account(sf::ACCOUNT, &id)
            .array(sf::HOOKS, elements)
            .build();
        self.insert_entry(Keylet::hook(&id), entry);
        self.hooks.insert(id, hooks);
    }

    pub fn emitted(&self) -> &BTreeMap<Hash256, Vec<u8>> {
        &self.emitted
    }

    /// All state entries under one namespace of an account.
    pub fn namespace_entries(
        &self,
        id: &AccountId,
        namespace: &Hash256,
    ) -> Option<&BTreeMap<Hash256, Vec<u8>>> {
        self.state.get(&(*id, *namespace))
    }

    fn store_account(&mut self, root: AccountRoot) {
        self.insert_entry(Keylet::account(&root.id), root.serialize());
        self.accounts.insert(root.id, root);
    }

    fn write_state(&mut self, id: &AccountId, namespace: &Hash256, key: &Hash256, data: Vec<u8>) {
        let entry = ObjectBuilder::new()
            .u16(sf::LEDGER_ENTRY_TYPE, entry_type::HOOK_STATE)
            .u32(sf::FLAGS, 0)
            .u64(sf::OWNER_NODE, 0)
            .h256(sf::HOOK_STATE_KEY, key)
            .vl(sf::HOOK_STATE_DATA, &data)
            .build();
        self.insert_entry(Keylet::hook_state(id, key, namespace), entry);
        self.state
            .entry((*id, *namespace))
            .or_default()
            .insert(*key, data);
    }
}

impl LedgerView for MemoryLedger {
    fn info(&self) -> LedgerInfo {
        self.info
    }

    fn fees(&self) -> Fees {
        self.fees
    }

    fn read(&self, keylet: &Keylet) -> Option<Vec<u8>> {
        let (actual, bytes) = self.entries.get(&keylet.key)?;
        keylet.accepts(*actual).then(|| bytes.clone())
    }

    fn successor(&self, after: &Hash256, last: &Hash256) -> Option<Hash256> {
        if after >= last {
            return None;
        }
        self.entries
            .range((Bound::Excluded(*after), Bound::Included(*last)))
            .next()
            .map(|(key, _)| *key)
    }

    fn account(&self, id: &AccountId) -> Option<AccountRoot> {
        self.accounts.get(id).cloned()
    }

    fn hook_state(&self, id: &AccountId, namespace: &Hash256, key: &Hash256) -> Option<Vec<u8>> {
        self.state.get(&(*id, *namespace))?.get(key).cloned()
    }

    fn namespace_exists(&self, id: &AccountId, namespace: &Hash256) -> bool {
        self.state
            .get(&(*id, *namespace))
            .map_or(false, |entries| !entries.is_empty())
    }

    fn hooks(&self, id: &AccountId) -> Option<Vec<InstalledHook>> {
        self.hooks.get(id).cloned()
    }

    fn hook_definition(&self, hash: &Hash256) -> Option<HookDefinition> {
        self.definitions.get(hash).cloned()
    }

    fn transaction(&self, id: &Hash256) -> Option<Vec<u8>> {
        self.transactions.get(id).cloned()
    }

    fn preflight(&self, txn: &[u8]) -> std::result::Result<(), String> {
        if self.rejected.contains(txn) {
            return Err("transaction rejected in preflight".to_string());
        }
        Ok(())
    }
}

impl LedgerStore for MemoryLedger {
    fn put_account(&mut self, root: AccountRoot) -> Result<()> {
        self.store_account(root);
        Ok(())
    }

    fn put_hook_state(
        &mut self,
        id: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
        data: Vec<u8>,
    ) -> Result<()> {
        if !self.accounts.contains_key(id) {
            return Err(EngineError::Ledger(format!(
                "state write for missing account {}",
                hex::encode_upper(id)
            )));
        }
        debug!(account = %hex::encode_upper(id), key = %hex::encode_upper(key), "put hook state");
        self.write_state(id, namespace, key, data);
        Ok(())
    }

    fn erase_hook_state(
        &mut self,
        id: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
    ) -> Result<bool> {
        let dir = (*id, *namespace);
        let Some(entries) = self.state.get_mut(&dir) else {
            return Err(EngineError::Ledger("namespace directory missing".into()));
        };
        entries.remove(key);
        self.entries.remove(&Keylet::hook_state(id, key, namespace).key);
        let emptied = entries.is_empty();
        if emptied {
            self.state.remove(&dir);
        }
        Ok(emptied)
    }

    fn insert_emitted(&mut self, id: Hash256, txn: Vec<u8>) -> Result<()> {
        let mut entry = ObjectBuilder::new()
            .u16(sf::LEDGER_ENTRY_TYPE, entry_type::EMITTED_TXN)
            .u32(sf::FLAGS, 0)
            .build();
        sf::EMITTED_TXN.write_header(&mut entry);
        entry.extend_from_slice(&txn);
        entry.push(crate::sto::field::OBJECT_END);
        self.insert_entry(Keylet::emitted_txn(&id), entry);
        self.emitted.insert(id, txn);
        Ok(())
    }
}
