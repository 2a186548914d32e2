//! The engine's window onto the ledger.
//!
//! Storage and consensus live outside this crate. Hook execution only needs
//! a read view ([`LedgerView`]); the commit step additionally needs a small
//! set of mutations ([`LedgerStore`]). [`MemoryLedger`] implements both for
//! tests, benches and the CLI.

pub mod address;
pub mod keylet;
pub mod memory;

pub use keylet::{Keylet, SeqProxy};
pub use memory::MemoryLedger;

use crate::sto::{sf, ObjectBuilder};
use crate::Result;
use serde::{Deserialize, Serialize};

pub type AccountId = [u8; 20];
pub type Hash256 = [u8; 32];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    /// Sequence of the ledger being built.
    pub seq: u32,
    pub parent_close_time: u32,
    pub parent_hash: Hash256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fees {
    /// Reference fee in drops.
    pub base: u64,
    pub reserve: u64,
    pub increment: u64,
}

impl Fees {
    pub fn account_reserve(&self, owner_count: u32) -> u64 {
        self.reserve
            .saturating_add(self.increment.saturating_mul(owner_count as u64))
    }
}

impl Default for Fees {
    fn default() -> Self {
        Self {
            base: 10,
            reserve: 1_000_000,
            increment: 200_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRoot {
    pub id: AccountId,
    /// Native balance in drops.
    pub balance: u64,
    pub owner_count: u32,
    pub sequence: u32,
    pub hook_state_count: u32,
    /// Namespaces holding at least one state entry.
    pub namespaces: Vec<Hash256>,
}

impl AccountRoot {
    pub fn new(id: AccountId, balance: u64) -> Self {
        Self {
            id,
            balance,
            owner_count: 0,
            sequence: 1,
            hook_state_count: 0,
            namespaces: Vec::new(),
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut entry = ObjectBuilder::new()
            .u16(sf::LEDGER_ENTRY_TYPE, keylet::entry_type::ACCOUNT_ROOT)
            .u32(sf::FLAGS, 0)
            .u32(sf::SEQUENCE, self.sequence)
            .u32(sf::OWNER_COUNT, self.owner_count)
            .drops(sf::BALANCE, self.balance)
            .account(sf::ACCOUNT, &self.id);
        if self.hook_state_count > 0 {
            entry = entry.u32(sf::HOOK_STATE_COUNT, self.hook_state_count);
        }
        if !self.namespaces.is_empty() {
            entry = entry.vl(sf::HOOK_NAMESPACES, &self.namespaces.concat());
        }
        entry.build()
    }
}

/// Permission for another account's hook to write this account's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookGrant {
    pub hook_hash: Hash256,
    /// When set, only hooks running on this account may use the grant.
    pub authorize: Option<AccountId>,
}

/// One position in an account's hook chain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledHook {
    /// Empty positions carry no hash.
    pub hook_hash: Option<Hash256>,
    /// Overrides the definition's namespace when present.
    pub namespace: Option<Hash256>,
    pub grants: Vec<HookGrant>,
    /// Overrides the definition's parameters.
    pub parameters: Vec<(Vec<u8>, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookDefinition {
    pub hook_hash: Hash256,
    pub namespace: Hash256,
    pub parameters: Vec<(Vec<u8>, Vec<u8>)>,
    pub code: Vec<u8>,
}

/// Read-only access used while hooks execute.
pub trait LedgerView {
    fn info(&self) -> LedgerInfo;

    fn fees(&self) -> Fees;

    /// Serialized ledger entry at `keylet`, if one of a compatible type exists.
    fn read(&self, keylet: &Keylet) -> Option<Vec<u8>>;

    /// First entry key strictly after `after` and no greater than `last`.
    fn successor(&self, after: &Hash256, last: &Hash256) -> Option<Hash256>;

    fn account(&self, id: &AccountId) -> Option<AccountRoot>;

    fn hook_state(&self, id: &AccountId, namespace: &Hash256, key: &Hash256) -> Option<Vec<u8>>;

    /// Whether the account already has a state directory for `namespace`.
    fn namespace_exists(&self, id: &AccountId, namespace: &Hash256) -> bool;

    /// The account's hook chain, `None` when it has no hooks entry.
    fn hooks(&self, id: &AccountId) -> Option<Vec<InstalledHook>>;

    fn hook_definition(&self, hash: &Hash256) -> Option<HookDefinition>;

    /// A previously applied transaction by id.
    fn transaction(&self, id: &Hash256) -> Option<Vec<u8>>;

    /// Minimum fee in drops for a serialized transaction, `None` when it
    /// cannot be parsed.
    fn base_fee(&self, txn: &[u8]) -> Option<u64> {
        crate::sto::ops::validate(txn)
            .ok()
            .filter(|valid| *valid == 1)
            .map(|_| self.fees().base)
    }

    /// Stateless transaction checks run on emitted transactions.
    fn preflight(&self, _txn: &[u8]) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Mutations applied when a hook chain's results are committed.
pub trait LedgerStore: LedgerView {
    fn put_account(&mut self, root: AccountRoot) -> Result<()>;

    /// Create or replace a state entry, creating its namespace directory.
    fn put_hook_state(
        &mut self,
        id: &AccountId,
        namespace: &Hash256,
        key: &Hash256,
        data: Vec<u8>,
    ) -> Result<()>;

    /// Remove a state entry. Returns true when the namespace directory was
    /// removed along with it.
    fn erase_hook_state(&mut self, id: &AccountId, namespace: &Hash256, key: &Hash256)
        -> Result<bool>;

    fn insert_emitted(&mut self, id: Hash256, txn: Vec<u8>) -> Result<()>;
}
