//! Keylets: typed 32-byte ledger keys.
//!
//! A keylet pairs a ledger entry type with the SHA-512Half of a namespace
//! character and the entry's identifying fields. Guests exchange them in a
//! 34-byte form: the entry type as a big-endian `u16`, then the key.

use super::{AccountId, Hash256};
use crate::api::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::fmt;

pub const KEYLET_LEN: usize = 34;

/// Ledger entry type codes.
pub mod entry_type {
    pub const ANY: u16 = 0;
    pub const CHILD: u16 = 0x1CD2;
    pub const TICKET: u16 = 0x54;
    pub const SIGNER_LIST: u16 = 0x53;
    pub const OFFER: u16 = 0x6f;
    pub const LEDGER_HASHES: u16 = 0x68;
    pub const AMENDMENTS: u16 = 0x66;
    pub const FEE_SETTINGS: u16 = 0x73;
    pub const ESCROW: u16 = 0x75;
    pub const PAYCHAN: u16 = 0x78;
    pub const CHECK: u16 = 0x43;
    pub const DEPOSIT_PREAUTH: u16 = 0x70;
    pub const NEGATIVE_UNL: u16 = 0x4e;
    pub const NFTOKEN_OFFER: u16 = 0x37;
    pub const ACCOUNT_ROOT: u16 = 0x61;
    pub const DIR_NODE: u16 = 0x64;
    pub const RIPPLE_STATE: u16 = 0x72;
    pub const HOOK: u16 = 0x48;
    pub const HOOK_DEFINITION: u16 = 0x44;
    pub const HOOK_STATE: u16 = 0x76;
    pub const EMITTED_TXN: u16 = 0x45;
}

/// Keylet selectors accepted by `util_keylet`.
pub mod keylet_code {
    pub const HOOK: u32 = 1;
    pub const HOOK_STATE: u32 = 2;
    pub const ACCOUNT: u32 = 3;
    pub const AMENDMENTS: u32 = 4;
    pub const CHILD: u32 = 5;
    pub const SKIP: u32 = 6;
    pub const FEES: u32 = 7;
    pub const NEGATIVE_UNL: u32 = 8;
    pub const LINE: u32 = 9;
    pub const OFFER: u32 = 10;
    pub const QUALITY: u32 = 11;
    pub const EMITTED_DIR: u32 = 12;
    pub const TICKET: u32 = 13;
    pub const SIGNERS: u32 = 14;
    pub const CHECK: u32 = 15;
    pub const DEPOSIT_PREAUTH: u32 = 16;
    pub const UNCHECKED: u32 = 17;
    pub const OWNER_DIR: u32 = 18;
    pub const PAGE: u32 = 19;
    pub const ESCROW: u32 = 20;
    pub const PAYCHAN: u32 = 21;
    pub const EMITTED_TXN: u32 = 22;
    pub const NFT_OFFER: u32 = 23;
    pub const HOOK_DEFINITION: u32 = 24;
    pub const HOOK_STATE_DIR: u32 = 25;
    pub const LAST: u32 = HOOK_STATE_DIR;
}

mod space {
    pub const ACCOUNT: u8 = b'a';
    pub const DIR_NODE: u8 = b'd';
    pub const TRUST_LINE: u8 = b'r';
    pub const OFFER: u8 = b'o';
    pub const OWNER_DIR: u8 = b'O';
    pub const SKIP_LIST: u8 = b's';
    pub const ESCROW: u8 = b'u';
    pub const AMENDMENTS: u8 = b'f';
    pub const FEES: u8 = b'e';
    pub const TICKET: u8 = b'T';
    pub const SIGNER_LIST: u8 = b'S';
    pub const PAYCHAN: u8 = b'x';
    pub const CHECK: u8 = b'C';
    pub const DEPOSIT_PREAUTH: u8 = b'p';
    pub const NEGATIVE_UNL: u8 = b'N';
    pub const NFT_OFFER: u8 = b'q';
    pub const HOOK: u8 = b'H';
    pub const HOOK_STATE: u8 = b'v';
    pub const HOOK_DEFINITION: u8 = b'D';
    pub const EMITTED_TXN: u8 = b'E';
    pub const EMITTED_DIR: u8 = b'F';
    pub const HOOK_STATE_DIR: u8 = b'J';
}

/// First 32 bytes of SHA-512 over the concatenated parts.
pub fn sha512_half(parts: &[&[u8]]) -> Hash256 {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let digest = hasher.finalize();
    let mut out = [0u8; 32];
    out.copy_from_slice(&digest[..32]);
    out
}

fn indexed(space: u8, parts: &[&[u8]]) -> Hash256 {
    let prefix = (space as u16).to_be_bytes();
    let mut all: Vec<&[u8]> = Vec::with_capacity(parts.len() + 1);
    all.push(&prefix);
    all.extend_from_slice(parts);
    sha512_half(&all)
}

/// Sequence argument of offers, checks, escrows and channels. The ledger
/// accepts either a plain sequence number or a 32-byte ticket-derived id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqProxy {
    Number(u32),
    Hash(Hash256),
}

impl SeqProxy {
    fn bytes(&self) -> Vec<u8> {
        match self {
            SeqProxy::Number(n) => n.to_be_bytes().to_vec(),
            SeqProxy::Hash(h) => h.to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Keylet {
    pub entry_type: u16,
    pub key: Hash256,
}

impl Keylet {
    pub fn new(entry_type: u16, key: Hash256) -> Self {
        Self { entry_type, key }
    }

    pub fn to_bytes(&self) -> [u8; KEYLET_LEN] {
        let mut out = [0u8; KEYLET_LEN];
        out[..2].copy_from_slice(&self.entry_type.to_be_bytes());
        out[2..].copy_from_slice(&self.key);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != KEYLET_LEN {
            return None;
        }
        let entry_type = u16::from_be_bytes([bytes[0], bytes[1]]);
        let mut key = [0u8; 32];
        key.copy_from_slice(&bytes[2..]);
        Some(Self { entry_type, key })
    }

    /// Whether an entry of `actual` type may be returned for this keylet.
    pub fn accepts(&self, actual: u16) -> bool {
        match self.entry_type {
            entry_type::ANY => true,
            entry_type::CHILD => actual != entry_type::DIR_NODE,
            expected => expected == actual,
        }
    }

    // ── constructors ─────────────────────────────────────────────

    pub fn account(id: &AccountId) -> Self {
        Self::new(entry_type::ACCOUNT_ROOT, indexed(space::ACCOUNT, &[id]))
    }

    pub fn owner_dir(id: &AccountId) -> Self {
        Self::new(entry_type::DIR_NODE, indexed(space::OWNER_DIR, &[id]))
    }

    pub fn hook(id: &AccountId) -> Self {
        Self::new(entry_type::HOOK, indexed(space::HOOK, &[id]))
    }

    pub fn signers(id: &AccountId) -> Self {
        Self::new(
            entry_type::SIGNER_LIST,
            indexed(space::SIGNER_LIST, &[id, &0u32.to_be_bytes()]),
        )
    }

    pub fn hook_state(id: &AccountId, key: &Hash256, namespace: &Hash256) -> Self {
        Self::new(
            entry_type::HOOK_STATE,
            indexed(space::HOOK_STATE, &[id, key, namespace]),
        )
    }

    pub fn hook_state_dir(id: &AccountId, namespace: &Hash256) -> Self {
        Self::new(
            entry_type::DIR_NODE,
            indexed(space::HOOK_STATE_DIR, &[id, namespace]),
        )
    }

    pub fn hook_definition(hash: &Hash256) -> Self {
        Self::new(
            entry_type::HOOK_DEFINITION,
            indexed(space::HOOK_DEFINITION, &[hash]),
        )
    }

    pub fn emitted_txn(id: &Hash256) -> Self {
        Self::new(entry_type::EMITTED_TXN, indexed(space::EMITTED_TXN, &[id]))
    }

    pub fn emitted_dir() -> Self {
        Self::new(entry_type::DIR_NODE, indexed(space::EMITTED_DIR, &[]))
    }

    pub fn amendments() -> Self {
        Self::new(entry_type::AMENDMENTS, indexed(space::AMENDMENTS, &[]))
    }

    pub fn fees() -> Self {
        Self::new(entry_type::FEE_SETTINGS, indexed(space::FEES, &[]))
    }

    pub fn negative_unl() -> Self {
        Self::new(entry_type::NEGATIVE_UNL, indexed(space::NEGATIVE_UNL, &[]))
    }

    /// The short skip list, or the long one covering `ledger`.
    pub fn skip(ledger: Option<u32>) -> Self {
        let key = match ledger {
            None => indexed(space::SKIP_LIST, &[]),
            Some(seq) => indexed(space::SKIP_LIST, &[&(seq >> 16).to_be_bytes()]),
        };
        Self::new(entry_type::LEDGER_HASHES, key)
    }

    pub fn line(a: &AccountId, b: &AccountId, currency: &[u8; 20]) -> Self {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        Self::new(
            entry_type::RIPPLE_STATE,
            indexed(space::TRUST_LINE, &[lo, hi, currency]),
        )
    }

    pub fn offer(id: &AccountId, seq: SeqProxy) -> Self {
        Self::new(entry_type::OFFER, indexed(space::OFFER, &[id, &seq.bytes()]))
    }

    pub fn check(id: &AccountId, seq: SeqProxy) -> Self {
        Self::new(entry_type::CHECK, indexed(space::CHECK, &[id, &seq.bytes()]))
    }

    pub fn escrow(id: &AccountId, seq: SeqProxy) -> Self {
        Self::new(entry_type::ESCROW, indexed(space::ESCROW, &[id, &seq.bytes()]))
    }

    pub fn nft_offer(id: &AccountId, seq: SeqProxy) -> Self {
        Self::new(
            entry_type::NFTOKEN_OFFER,
            indexed(space::NFT_OFFER, &[id, &seq.bytes()]),
        )
    }

    pub fn ticket(id: &AccountId, seq: u32) -> Self {
        Self::new(
            entry_type::TICKET,
            indexed(space::TICKET, &[id, &seq.to_be_bytes()]),
        )
    }

    pub fn paychan(src: &AccountId, dst: &AccountId, seq: SeqProxy) -> Self {
        Self::new(
            entry_type::PAYCHAN,
            indexed(space::PAYCHAN, &[src, dst, &seq.bytes()]),
        )
    }

    pub fn deposit_preauth(owner: &AccountId, preauthorized: &AccountId) -> Self {
        Self::new(
            entry_type::DEPOSIT_PREAUTH,
            indexed(space::DEPOSIT_PREAUTH, &[owner, preauthorized]),
        )
    }

    /// A directory page. Page zero is the root itself.
    pub fn page(root: &Hash256, index: u64) -> Self {
        if index == 0 {
            return Self::new(entry_type::DIR_NODE, *root);
        }
        Self::new(
            entry_type::DIR_NODE,
            indexed(space::DIR_NODE, &[root, &index.to_be_bytes()]),
        )
    }

    /// Book directory for `quality`, replacing the low 64 bits of the key.
    pub fn quality(base: &Keylet, quality: u64) -> ApiResult<Self> {
        if base.entry_type != entry_type::DIR_NODE {
            return Err(ApiError::InvalidArgument);
        }
        let mut key = base.key;
        key[24..].copy_from_slice(&quality.to_be_bytes());
        Ok(Self::new(entry_type::DIR_NODE, key))
    }

    pub fn child(key: &Hash256) -> Self {
        Self::new(entry_type::CHILD, *key)
    }

    pub fn unchecked(key: &Hash256) -> Self {
        Self::new(entry_type::ANY, *key)
    }
}

impl fmt::Display for Keylet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}:{}", self.entry_type, hex::encode_upper(self.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_form_round_trip() {
        let kl = Keylet::account(&[7; 20]);
        let bytes = kl.to_bytes();
        assert_eq!(&bytes[..2], &[0x00, 0x61]);
        assert_eq!(Keylet::from_bytes(&bytes), Some(kl));
        assert_eq!(Keylet::from_bytes(&bytes[..33]), None);
    }

    #[test]
    fn test_keys_depend_on_namespace() {
        let id = [1u8; 20];
        assert_ne!(Keylet::account(&id).key, Keylet::hook(&id).key);
        assert_ne!(Keylet::account(&id).key, Keylet::owner_dir(&id).key);
    }

    #[test]
    fn test_account_key_matches_manual_hash() {
        let id = [9u8; 20];
        let mut preimage = vec![0x00, b'a'];
        preimage.extend_from_slice(&id);
        assert_eq!(Keylet::account(&id).key, sha512_half(&[&preimage]));
    }

    #[test]
    fn test_line_is_symmetric() {
        let (a, b) = ([1u8; 20], [2u8; 20]);
        let usd = crate::xfl::parse_currency(b"USD").unwrap();
        assert_eq!(Keylet::line(&a, &b, &usd), Keylet::line(&b, &a, &usd));
    }

    #[test]
    fn test_page_zero_is_root() {
        let root = Keylet::owner_dir(&[3; 20]);
        assert_eq!(Keylet::page(&root.key, 0), root);
        assert_ne!(Keylet::page(&root.key, 1), root);
    }

    #[test]
    fn test_quality_overwrites_low_bits() {
        let base = Keylet::owner_dir(&[3; 20]);
        let q = Keylet::quality(&base, 0x0102_0304_0506_0708).unwrap();
        assert_eq!(&q.key[..24], &base.key[..24]);
        assert_eq!(&q.key[24..], &[1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(
            Keylet::quality(&Keylet::account(&[3; 20]), 1),
            Err(ApiError::InvalidArgument)
        );
    }

    #[test]
    fn test_accepts() {
        assert!(Keylet::unchecked(&[0; 32]).accepts(entry_type::OFFER));
        assert!(!Keylet::child(&[0; 32]).accepts(entry_type::DIR_NODE));
        assert!(!Keylet::account(&[0; 20]).accepts(entry_type::HOOK));
    }
}
