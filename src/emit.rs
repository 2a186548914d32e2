//! Emission: staging transactions a hook wants submitted later.
//!
//! A hook first reserves how many transactions it will emit. Burden and
//! generation of the originating transaction propagate into every emitted
//! one, and each emitted transaction must embed a nonce this execution
//! actually issued. `validate_emission` enforces the full rule set; any
//! failure rejects the whole transaction.

use crate::api::{ApiError, ApiResult};
use crate::config::EngineConfig;
use crate::ledger::keylet::sha512_half;
use crate::ledger::{AccountId, Hash256, LedgerView};
use crate::sto::{sf, ObjectView};
use std::collections::BTreeSet;
use tracing::{debug, warn};

const NONCE_PREFIX: &[u8] = b"ETX\0";
const TXID_PREFIX: &[u8] = b"TXN\0";

/// Emit details length when the hook exports a callback.
pub const DETAILS_LEN: usize = 138;
/// Emit details length without the callback account.
pub const DETAILS_LEN_NO_CALLBACK: usize = DETAILS_LEN - 22;

const PSEUDO_TXN_TYPES: [u16; 3] = [100, 101, 102];

/// Identifier of a serialized transaction.
pub fn transaction_id(blob: &[u8]) -> Hash256 {
    sha512_half(&[TXID_PREFIX, blob])
}

/// A transaction accepted by `emit`, waiting for the chain to finish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedTxn {
    pub id: Hash256,
    pub blob: Vec<u8>,
}

/// Who is emitting, and from which originating transaction.
#[derive(Debug, Clone, Copy)]
pub struct EmitOrigin<'a> {
    pub account: &'a AccountId,
    pub hook_hash: &'a Hash256,
    pub otxn_id: &'a Hash256,
    pub otxn: &'a [u8],
    /// `strong << 1 | callback | chain position << 2`
    pub nonce_flags: u32,
    /// The hook exports `cbak`.
    pub has_callback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct EmitState {
    expected: Option<u32>,
    nonce_counter: u32,
    issued: BTreeSet<Hash256>,
    burden: Option<u64>,
    generation: Option<u32>,
}

impl EmitState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reserved(&self) -> Option<u32> {
        self.expected
    }

    /// `etxn_reserve`
    pub fn reserve(&mut self, count: u32, config: &EngineConfig) -> ApiResult<i64> {
        if self.expected.is_some() {
            return Err(ApiError::AlreadySet);
        }
        if count < 1 {
            return Err(ApiError::TooSmall);
        }
        if count > config.max_emit {
            return Err(ApiError::TooBig);
        }
        self.expected = Some(count);
        Ok(count as i64)
    }

    /// Burden of the originating transaction: 1 unless it was emitted.
    pub fn otxn_burden(&mut self, otxn: &[u8]) -> u64 {
        if let Some(burden) = self.burden {
            return burden;
        }
        let Some(burden) = emit_details(otxn).and_then(|d| d.u64(sf::EMIT_BURDEN)) else {
            return 1;
        };
        let burden = burden & ((1u64 << 63) - 1);
        self.burden = Some(burden);
        burden
    }

    /// Generation of the originating transaction: 0 unless it was emitted.
    pub fn otxn_generation(&mut self, otxn: &[u8]) -> u32 {
        if let Some(generation) = self.generation {
            return generation;
        }
        let Some(generation) = emit_details(otxn).and_then(|d| d.u32(sf::EMIT_GENERATION)) else {
            return 0;
        };
        self.generation = Some(generation);
        generation
    }

    pub fn etxn_generation(&mut self, otxn: &[u8]) -> i64 {
        self.otxn_generation(otxn) as i64 + 1
    }

    pub fn etxn_burden(&mut self, otxn: &[u8]) -> ApiResult<i64> {
        let expected = self.expected.ok_or(ApiError::PrerequisiteNotMet)?;
        let burden = self
            .otxn_burden(otxn)
            .checked_mul(expected as u64)
            .ok_or(ApiError::FeeTooLarge)?;
        i64::try_from(burden).map_err(|_| ApiError::FeeTooLarge)
    }

    /// Issue the next emission nonce and remember it.
    pub fn nonce(&mut self, origin: &EmitOrigin<'_>, config: &EngineConfig) -> ApiResult<Hash256> {
        if self.nonce_counter > config.max_nonce {
            return Err(ApiError::TooManyNonces);
        }
        let counter = (self.nonce_counter as u16).to_be_bytes();
        self.nonce_counter += 1;
        let nonce = sha512_half(&[
            NONCE_PREFIX,
            origin.otxn_id,
            &counter,
            origin.account,
            origin.hook_hash,
            &origin.nonce_flags.to_be_bytes(),
        ]);
        self.issued.insert(nonce);
        Ok(nonce)
    }

    pub fn nonce_issued(&self, nonce: &Hash256) -> bool {
        self.issued.contains(nonce)
    }

    /// `etxn_details`: a ready-made `EmitDetails` field.
    pub fn details(
        &mut self,
        origin: &EmitOrigin<'_>,
        config: &EngineConfig,
        capacity: usize,
    ) -> ApiResult<Vec<u8>> {
        let size = if origin.has_callback {
            DETAILS_LEN
        } else {
            DETAILS_LEN_NO_CALLBACK
        };
        if capacity < size {
            return Err(ApiError::TooSmall);
        }
        if self.expected.is_none() {
            return Err(ApiError::PrerequisiteNotMet);
        }
        let generation = self.etxn_generation(origin.otxn) as u32;
        let burden = self.etxn_burden(origin.otxn)?;
        if burden < 1 {
            return Err(ApiError::FeeTooLarge);
        }
        let nonce = self.nonce(origin, config).map_err(|_| ApiError::InternalError)?;

        let mut out = Vec::with_capacity(size);
        out.push(0xED);
        out.extend_from_slice(&[0x20, 0x2E]);
        out.extend_from_slice(&generation.to_be_bytes());
        out.push(0x3D);
        out.extend_from_slice(&(burden as u64).to_be_bytes());
        out.push(0x5B);
        out.extend_from_slice(origin.otxn_id);
        out.push(0x5C);
        out.extend_from_slice(&nonce);
        out.push(0x5D);
        out.extend_from_slice(origin.hook_hash);
        if origin.has_callback {
            out.extend_from_slice(&[0x8A, 0x14]);
            out.extend_from_slice(origin.account);
        }
        out.push(0xE1);
        Ok(out)
    }
}

fn emit_details(txn: &[u8]) -> Option<ObjectView<'_>> {
    ObjectView::parse(txn)?.object(sf::EMIT_DETAILS)
}

/// `etxn_fee_base`: minimum fee for a serialized transaction.
pub fn fee_base(state: &EmitState, view: &dyn LedgerView, blob: &[u8]) -> ApiResult<i64> {
    if state.reserved().is_none() {
        return Err(ApiError::PrerequisiteNotMet);
    }
    let fee = view.base_fee(blob).ok_or(ApiError::InvalidTxn)?;
    i64::try_from(fee).map_err(|_| ApiError::FeeTooLarge)
}

fn reject(rule: &str) -> ApiError {
    warn!(rule, "emission rejected");
    ApiError::EmissionFailure
}

/// Check a transaction a hook wants to emit. On success the caller queues
/// the returned transaction and hands its id back to the guest.
pub fn validate_emission(
    state: &mut EmitState,
    queued: usize,
    origin: &EmitOrigin<'_>,
    view: &dyn LedgerView,
    config: &EngineConfig,
    blob: &[u8],
) -> ApiResult<EmittedTxn> {
    let expected = state.reserved().ok_or(ApiError::PrerequisiteNotMet)?;
    if queued >= expected as usize {
        return Err(ApiError::TooManyEmittedTxn);
    }
    let txn = ObjectView::parse(blob).ok_or_else(|| reject("unparseable"))?;
    let txn_type = txn
        .u16(sf::TRANSACTION_TYPE)
        .ok_or_else(|| reject("transaction type missing"))?;
    if PSEUDO_TXN_TYPES.contains(&txn_type) {
        return Err(reject("pseudo transaction"));
    }

    if txn.account(sf::ACCOUNT) != Some(*origin.account) {
        return Err(reject("account is not the hook account"));
    }
    if txn.u32(sf::SEQUENCE) != Some(0) {
        return Err(reject("sequence must be zero"));
    }
    let signing_key = txn
        .payload(sf::SIGNING_PUB_KEY)
        .ok_or_else(|| reject("signing key missing"))?;
    if (signing_key.len() != 33 && !signing_key.is_empty())
        || signing_key.iter().any(|b| *b != 0)
    {
        return Err(reject("signing key must be zero"));
    }
    if txn.contains(sf::SIGNERS) {
        return Err(reject("signers present"));
    }
    if txn.contains(sf::TICKET_SEQUENCE) {
        return Err(reject("ticket sequence present"));
    }
    if txn.contains(sf::ACCOUNT_TXN_ID) {
        return Err(reject("account txn id present"));
    }

    let details = txn
        .object(sf::EMIT_DETAILS)
        .ok_or_else(|| reject("emit details missing"))?;
    let (Some(generation), Some(burden), Some(parent), Some(nonce), Some(hook_hash)) = (
        details.u32(sf::EMIT_GENERATION),
        details.u64(sf::EMIT_BURDEN),
        details.h256(sf::EMIT_PARENT_TXN_ID),
        details.h256(sf::EMIT_NONCE),
        details.h256(sf::EMIT_HOOK_HASH),
    ) else {
        return Err(reject("emit details incomplete"));
    };
    if generation >= config.max_emit_generation {
        return Err(reject("generation too deep"));
    }
    if generation as i64 != state.etxn_generation(origin.otxn) {
        return Err(reject("generation mismatch"));
    }
    // compared as 32 bits, the way the burden was always checked
    let expected_burden = state.etxn_burden(origin.otxn).unwrap_or_default() as u32 as u64;
    if burden != expected_burden {
        return Err(reject("burden mismatch"));
    }
    if parent != *origin.otxn_id {
        return Err(reject("parent txn id mismatch"));
    }
    if !state.nonce_issued(&nonce) {
        return Err(reject("nonce not issued by this execution"));
    }
    if details.contains(sf::EMIT_CALLBACK)
        && details.account(sf::EMIT_CALLBACK) != Some(*origin.account)
    {
        return Err(reject("callback is not the hook account"));
    }
    if hook_hash != *origin.hook_hash {
        return Err(reject("hook hash mismatch"));
    }

    if txn.contains(sf::TXN_SIGNATURE) {
        return Err(reject("signature present"));
    }
    let seq = view.info().seq;
    let last = txn
        .u32(sf::LAST_LEDGER_SEQUENCE)
        .ok_or_else(|| reject("last ledger sequence missing"))?;
    if (last as u64) < seq as u64 + 1 || last as u64 > seq as u64 + config.max_ledger_lookahead as u64 {
        return Err(reject("last ledger sequence out of range"));
    }
    match txn.u32(sf::FIRST_LEDGER_SEQUENCE) {
        Some(first) if first <= last => {}
        _ => return Err(reject("first ledger sequence")),
    }

    let min_fee = fee_base(state, view, blob).map_err(|_| reject("fee not computable"))?;
    let fee = txn
        .native_drops(sf::FEE)
        .ok_or_else(|| reject("fee missing"))?;
    if (fee as i64) < min_fee {
        return Err(reject("fee below minimum"));
    }
    if let Err(reason) = view.preflight(blob) {
        warn!(%reason, "emitted transaction failed preflight");
        return Err(ApiError::EmissionFailure);
    }

    let id = transaction_id(blob);
    debug!(txid = %hex::encode_upper(id), "emission accepted");
    Ok(EmittedTxn {
        id,
        blob: blob.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{AccountRoot, Fees, LedgerInfo, MemoryLedger};
    use crate::sto::ObjectBuilder;

    const ACCOUNT: AccountId = [0xA1; 20];
    const HOOK_HASH: Hash256 = [0x42; 32];
    const OTXN_ID: Hash256 = [0x0F; 32];

    fn origin(otxn: &[u8]) -> EmitOrigin<'_> {
        EmitOrigin {
            account: &ACCOUNT,
            hook_hash: &HOOK_HASH,
            otxn_id: &OTXN_ID,
            otxn,
            nonce_flags: 0b10,
            has_callback: false,
        }
    }

    fn ledger() -> MemoryLedger {
        MemoryLedger::new(
            LedgerInfo {
                seq: 100,
                ..LedgerInfo::default()
            },
            Fees::default(),
        )
        .with_account(AccountRoot::new(ACCOUNT, 50_000_000))
    }

    fn payment(details: ObjectBuilder) -> ObjectBuilder {
        ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 0)
            .u32(sf::SEQUENCE, 0)
            .u32(sf::FIRST_LEDGER_SEQUENCE, 101)
            .u32(sf::LAST_LEDGER_SEQUENCE, 105)
            .drops(sf::AMOUNT, 1_000)
            .drops(sf::FEE, 100)
            .vl(sf::SIGNING_PUB_KEY, &[])
            .account(sf::ACCOUNT, &ACCOUNT)
            .account(sf::DESTINATION, &[0xB0; 20])
            .object(sf::EMIT_DETAILS, details)
    }

    fn details(state: &mut EmitState, otxn: &[u8]) -> ObjectBuilder {
        let nonce = state.nonce(&origin(otxn), &EngineConfig::default()).unwrap();
        ObjectBuilder::new()
            .u32(sf::EMIT_GENERATION, 1)
            .u64(sf::EMIT_BURDEN, 1)
            .h256(sf::EMIT_PARENT_TXN_ID, &OTXN_ID)
            .h256(sf::EMIT_NONCE, &nonce)
            .h256(sf::EMIT_HOOK_HASH, &HOOK_HASH)
    }

    fn run(state: &mut EmitState, blob: &[u8]) -> ApiResult<EmittedTxn> {
        validate_emission(state, 0, &origin(&[]), &ledger(), &EngineConfig::default(), blob)
    }

    fn reserved() -> EmitState {
        let mut state = EmitState::new();
        state.reserve(1, &EngineConfig::default()).unwrap();
        state
    }

    #[test]
    fn test_reserve_rules() {
        let config = EngineConfig::default();
        let mut state = EmitState::new();
        assert_eq!(state.reserve(0, &config), Err(ApiError::TooSmall));
        assert_eq!(state.reserve(256, &config), Err(ApiError::TooBig));
        assert_eq!(state.reserve(2, &config), Ok(2));
        assert_eq!(state.reserve(2, &config), Err(ApiError::AlreadySet));
    }

    #[test]
    fn test_burden_and_generation_from_parent() {
        let otxn = ObjectBuilder::new()
            .u16(sf::TRANSACTION_TYPE, 0)
            .object(
                sf::EMIT_DETAILS,
                ObjectBuilder::new()
                    .u32(sf::EMIT_GENERATION, 3)
                    .u64(sf::EMIT_BURDEN, (1 << 63) | 7),
            )
            .build();
        let mut state = EmitState::new();
        assert_eq!(state.etxn_burden(&otxn), Err(ApiError::PrerequisiteNotMet));
        state.reserve(3, &EngineConfig::default()).unwrap();
        assert_eq!(state.otxn_burden(&otxn), 7);
        assert_eq!(state.etxn_burden(&otxn), Ok(21));
        assert_eq!(state.etxn_generation(&otxn), 4);
        assert_eq!(EmitState::new().otxn_burden(&[]), 1);
        assert_eq!(EmitState::new().otxn_generation(&[]), 0);
    }

    #[test]
    fn test_nonces_are_unique_and_bounded() {
        let config = EngineConfig {
            max_nonce: 1,
            ..EngineConfig::default()
        };
        let mut state = EmitState::new();
        let a = state.nonce(&origin(&[]), &config).unwrap();
        let b = state.nonce(&origin(&[]), &config).unwrap();
        assert_ne!(a, b);
        assert!(state.nonce_issued(&a) && state.nonce_issued(&b));
        assert_eq!(state.nonce(&origin(&[]), &config), Err(ApiError::TooManyNonces));
    }

    #[test]
    fn test_details_layout() {
        let mut state = reserved();
        let config = EngineConfig::default();
        assert_eq!(
            state.details(&origin(&[]), &config, 100),
            Err(ApiError::TooSmall)
        );
        let bytes = state.details(&origin(&[]), &config, 200).unwrap();
        assert_eq!(bytes.len(), DETAILS_LEN_NO_CALLBACK);
        let view = ObjectView::parse(&bytes).unwrap();
        let details = view.object(sf::EMIT_DETAILS).unwrap();
        assert_eq!(details.u32(sf::EMIT_GENERATION), Some(1));
        assert_eq!(details.u64(sf::EMIT_BURDEN), Some(1));
        assert!(state.nonce_issued(&details.h256(sf::EMIT_NONCE).unwrap()));

        let mut with_callback = origin(&[]);
        with_callback.has_callback = true;
        let bytes = state.details(&with_callback, &config, 200).unwrap();
        assert_eq!(bytes.len(), DETAILS_LEN);
        assert_eq!(&bytes[116..118], &[0x8A, 0x14]);
    }

    #[test]
    fn test_valid_emission() {
        let mut state = reserved();
        let blob = payment(details(&mut state, &[])).build();
        let emitted = run(&mut state, &blob).unwrap();
        assert_eq!(emitted.id, transaction_id(&blob));
    }

    #[test]
    fn test_nonzero_sequence_rejected() {
        let mut state = reserved();
        let blob = payment(details(&mut state, &[])).u32(sf::SEQUENCE, 1).build();
        assert_eq!(run(&mut state, &blob), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_first_after_last_rejected() {
        let mut state = reserved();
        let blob = payment(details(&mut state, &[]))
            .u32(sf::FIRST_LEDGER_SEQUENCE, 106)
            .build();
        assert_eq!(run(&mut state, &blob), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_wrong_burden_rejected() {
        let mut state = reserved();
        let blob = payment(details(&mut state, &[]).u64(sf::EMIT_BURDEN, 2)).build();
        assert_eq!(run(&mut state, &blob), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_foreign_nonce_rejected() {
        let mut state = reserved();
        let blob = payment(details(&mut state, &[]).h256(sf::EMIT_NONCE, &[9; 32])).build();
        assert_eq!(run(&mut state, &blob), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_last_ledger_window() {
        let mut state = reserved();
        let late = payment(details(&mut state, &[]))
            .u32(sf::LAST_LEDGER_SEQUENCE, 106)
            .build();
        assert_eq!(run(&mut state, &late), Err(ApiError::EmissionFailure));
        let stale = payment(details(&mut state, &[]))
            .u32(sf::FIRST_LEDGER_SEQUENCE, 100)
            .u32(sf::LAST_LEDGER_SEQUENCE, 100)
            .build();
        assert_eq!(run(&mut state, &stale), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_fee_floor_and_preflight() {
        let mut state = reserved();
        let cheap = payment(details(&mut state, &[])).drops(sf::FEE, 1).build();
        assert_eq!(run(&mut state, &cheap), Err(ApiError::EmissionFailure));

        let blob = payment(details(&mut state, &[])).build();
        let mut view = ledger();
        view.reject_in_preflight(blob.clone());
        assert_eq!(
            validate_emission(&mut state, 0, &origin(&[]), &view, &EngineConfig::default(), &blob),
            Err(ApiError::EmissionFailure)
        );
    }

    #[test]
    fn test_queue_limits() {
        let mut state = EmitState::new();
        assert_eq!(run(&mut state, &[0x12, 0, 0]), Err(ApiError::PrerequisiteNotMet));
        let mut state = reserved();
        assert_eq!(
            validate_emission(&mut state, 1, &origin(&[]), &ledger(), &EngineConfig::default(), &[]),
            Err(ApiError::TooManyEmittedTxn)
        );
        assert_eq!(run(&mut state, &[0x12, 0, 0, 0x24]), Err(ApiError::EmissionFailure));
    }

    #[test]
    fn test_fee_base_needs_reservation() {
        let view = ledger();
        let blob = payment(ObjectBuilder::new().u32(sf::EMIT_GENERATION, 1)).build();
        assert_eq!(fee_base(&EmitState::new(), &view, &blob), Err(ApiError::PrerequisiteNotMet));
        assert_eq!(fee_base(&reserved(), &view, &blob), Ok(10));
        assert_eq!(fee_base(&reserved(), &view, &[0x12]), Err(ApiError::InvalidTxn));
    }
}
