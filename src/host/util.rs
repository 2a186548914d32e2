//! Hashing, address conversion, signature checks, keylet construction and
//! the `sto_*` wrappers over [`crate::sto::ops`].

use crate::api::{ApiError, ApiResult};
use crate::context::HookContext;
use crate::ledger::address::{decode_account_id, encode_account_id};
use crate::ledger::keylet::{entry_type, keylet_code, sha512_half, KEYLET_LEN};
use crate::ledger::{AccountId, Hash256, Keylet, SeqProxy};
use crate::memory::{overlapping, GuestMemory};
use crate::sto::ops;
use crate::xfl::parse_currency;
use ed25519_dalek::{Signature, VerifyingKey};
use k256::ecdsa::signature::hazmat::PrehashVerifier;
use k256::ecdsa::{Signature as EcdsaSignature, VerifyingKey as EcdsaKey};

/// Longest accepted `r...` address input.
const MAX_ADDRESS_INPUT: u32 = 49;
const ED25519_PREFIX: u8 = 0xED;

impl HookContext<'_> {
    pub(crate) fn util_sha512h(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        if write_len < 32 {
            return Err(ApiError::TooSmall);
        }
        mem.check(write_ptr, write_len)?;
        let hash = sha512_half(&[mem.read(read_ptr, read_len)?]);
        mem.write(write_ptr, 32, &hash)
    }

    pub(crate) fn util_raddr(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        mem.check(read_ptr, read_len)?;
        if read_len != 20 {
            return Err(ApiError::InvalidArgument);
        }
        let id: AccountId = mem.read_array(read_ptr)?;
        let address = encode_account_id(&id);
        if (write_len as usize) < address.len() {
            return Err(ApiError::TooSmall);
        }
        mem.write(write_ptr, write_len, address.as_bytes())
    }

    pub(crate) fn util_accid(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        mem.check(read_ptr, read_len)?;
        if write_len < 20 {
            return Err(ApiError::TooSmall);
        }
        if read_len > MAX_ADDRESS_INPUT {
            return Err(ApiError::TooBig);
        }
        let raw = mem.read(read_ptr, read_len)?;
        // guests commonly pass C strings
        let text = raw.split(|b| *b == 0).next().unwrap_or_default();
        let id = std::str::from_utf8(text)
            .ok()
            .and_then(decode_account_id)
            .ok_or(ApiError::InvalidArgument)?;
        mem.write(write_ptr, 20, &id)
    }

    /// 1 when the signature verifies, 0 when it does not.
    pub(crate) fn util_verify(
        &mut self,
        mem: &GuestMemory<'_>,
        (data_ptr, data_len): (u32, u32),
        (sig_ptr, sig_len): (u32, u32),
        (key_ptr, key_len): (u32, u32),
    ) -> ApiResult<i64> {
        let data = mem.read(data_ptr, data_len)?;
        let sig = mem.read(sig_ptr, sig_len)?;
        let key = mem.read(key_ptr, key_len)?;
        if key_len != 33 {
            return Err(ApiError::InvalidKey);
        }
        if data_len == 0 || sig_len < 30 {
            return Err(ApiError::TooSmall);
        }
        match key[0] {
            ED25519_PREFIX => Ok(verify_ed25519(&key[1..], sig, data) as i64),
            0x02 | 0x03 => Ok(verify_secp256k1(key, sig, data) as i64),
            _ => Err(ApiError::InvalidKey),
        }
    }

    pub(crate) fn util_keylet(
        &mut self,
        mem: &mut GuestMemory<'_>,
        write_ptr: u32,
        write_len: u32,
        keylet_type: u32,
        args: [u32; 6],
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        if (write_len as usize) < KEYLET_LEN {
            return Err(ApiError::TooSmall);
        }
        if keylet_type == 0 || keylet_type > keylet_code::LAST {
            return Err(ApiError::InvalidArgument);
        }
        let keylet = build_keylet(mem, keylet_type, args)?;
        mem.write(write_ptr, KEYLET_LEN as u32, &keylet.to_bytes())
    }

    // ── sto ──────────────────────────────────────────────────────

    pub(crate) fn sto_subfield(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        field_id: u32,
    ) -> ApiResult<i64> {
        ops::subfield(mem.read(read_ptr, read_len)?, field_id)
    }

    pub(crate) fn sto_subarray(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        index: u32,
    ) -> ApiResult<i64> {
        ops::subarray(mem.read(read_ptr, read_len)?, index)
    }

    /// A zero field pointer and length deletes instead of inserting.
    pub(crate) fn sto_emplace(
        &mut self,
        mem: &mut GuestMemory<'_>,
        (write_ptr, write_len): (u32, u32),
        (sread_ptr, sread_len): (u32, u32),
        (fread_ptr, fread_len): (u32, u32),
        field_id: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        mem.check(sread_ptr, sread_len)?;
        mem.check(fread_ptr, fread_len)?;
        if (write_len as u64) < sread_len as u64 + fread_len as u64 {
            return Err(ApiError::TooSmall);
        }
        if sread_len as usize > ops::MAX_EMPLACE_SOURCE {
            return Err(ApiError::TooBig);
        }
        if sread_len < 2 {
            return Err(ApiError::TooSmall);
        }
        let delete = fread_ptr == 0 && fread_len == 0;
        let overlap = if delete {
            overlapping(&[(write_ptr, write_len), (sread_ptr, sread_len)])
        } else {
            if fread_len as usize > ops::MAX_EMPLACE_FIELD {
                return Err(ApiError::TooBig);
            }
            if fread_len < 2 {
                return Err(ApiError::TooSmall);
            }
            overlapping(&[
                (write_ptr, write_len),
                (sread_ptr, sread_len),
                (fread_ptr, fread_len),
            ])
        };
        if overlap {
            return Err(ApiError::MemOverlap);
        }

        let source = mem.read(sread_ptr, sread_len)?;
        let field = if delete {
            None
        } else {
            Some(mem.read(fread_ptr, fread_len)?)
        };
        let out = ops::emplace(source, field, field_id)?;
        if out.len() > write_len as usize {
            return Err(ApiError::InternalError);
        }
        mem.write(write_ptr, write_len, &out)
    }

    pub(crate) fn sto_erase(
        &mut self,
        mem: &mut GuestMemory<'_>,
        (write_ptr, write_len): (u32, u32),
        (read_ptr, read_len): (u32, u32),
        field_id: u32,
    ) -> ApiResult<i64> {
        mem.check(write_ptr, write_len)?;
        mem.check(read_ptr, read_len)?;
        if write_len < read_len {
            return Err(ApiError::TooSmall);
        }
        if overlapping(&[(write_ptr, write_len), (read_ptr, read_len)]) {
            return Err(ApiError::MemOverlap);
        }
        let out = ops::erase(mem.read(read_ptr, read_len)?, field_id)?;
        mem.write(write_ptr, write_len, &out)
    }

    pub(crate) fn sto_validate(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
    ) -> ApiResult<i64> {
        ops::validate(mem.read(read_ptr, read_len)?)
    }
}

fn verify_ed25519(key: &[u8], sig: &[u8], data: &[u8]) -> bool {
    let Ok(key) = <[u8; 32]>::try_from(key) else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&key) else {
        return false;
    };
    let Ok(sig) = Signature::from_slice(sig) else {
        return false;
    };
    key.verify_strict(data, &sig).is_ok()
}

/// DER signature over the SHA-512Half of `data`. High-S signatures are
/// accepted in their normalized form.
fn verify_secp256k1(key: &[u8], sig: &[u8], data: &[u8]) -> bool {
    let Ok(key) = EcdsaKey::from_sec1_bytes(key) else {
        return false;
    };
    let Ok(sig) = EcdsaSignature::from_der(sig) else {
        return false;
    };
    let sig = sig.normalize_s().unwrap_or(sig);
    key.verify_prehash(&sha512_half(&[data]), &sig).is_ok()
}

// ── keylets ──────────────────────────────────────────────────────

fn read_account(mem: &GuestMemory<'_>, ptr: u32, len: u32) -> ApiResult<AccountId> {
    mem.check(ptr, len)?;
    if len != 20 {
        return Err(ApiError::InvalidArgument);
    }
    mem.read_array(ptr)
}

fn read_hash(mem: &GuestMemory<'_>, ptr: u32, len: u32) -> ApiResult<Hash256> {
    mem.check(ptr, len)?;
    if len != 32 {
        return Err(ApiError::InvalidArgument);
    }
    mem.read_array(ptr)
}

fn require_zero(args: &[u32]) -> ApiResult<()> {
    if args.iter().any(|a| *a != 0) {
        return Err(ApiError::InvalidArgument);
    }
    Ok(())
}

/// Sequence argument: `len == 0` means `value` is the sequence itself,
/// `len == 32` points at a hash.
fn read_seq(mem: &GuestMemory<'_>, value: u32, len: u32) -> ApiResult<SeqProxy> {
    match len {
        0 => Ok(SeqProxy::Number(value)),
        32 => Ok(SeqProxy::Hash(read_hash(mem, value, len)?)),
        _ => Err(ApiError::InvalidArgument),
    }
}

fn build_keylet(mem: &GuestMemory<'_>, keylet_type: u32, args: [u32; 6]) -> ApiResult<Keylet> {
    let [a, b, c, d, e, f] = args;
    let keylet = match keylet_type {
        keylet_code::QUALITY => {
            if a == 0 || b == 0 {
                return Err(ApiError::InvalidArgument);
            }
            require_zero(&[e, f])?;
            mem.check(a, b)?;
            if b as usize != KEYLET_LEN {
                return Err(ApiError::InvalidArgument);
            }
            let base = mem.read(a, b)?;
            if base[..2] != entry_type::DIR_NODE.to_be_bytes() {
                return Err(ApiError::NoSuchKeylet);
            }
            let base = Keylet::from_bytes(base).ok_or(ApiError::NoSuchKeylet)?;
            Keylet::quality(&base, ((c as u64) << 32) | d as u64)?
        }

        keylet_code::HOOK_DEFINITION
        | keylet_code::CHILD
        | keylet_code::EMITTED_TXN
        | keylet_code::UNCHECKED => {
            require_zero(&[c, d, e, f])?;
            let hash = read_hash(mem, a, b)?;
            match keylet_type {
                keylet_code::HOOK_DEFINITION => Keylet::hook_definition(&hash),
                keylet_code::CHILD => Keylet::child(&hash),
                keylet_code::EMITTED_TXN => Keylet::emitted_txn(&hash),
                _ => Keylet::unchecked(&hash),
            }
        }

        keylet_code::OWNER_DIR
        | keylet_code::SIGNERS
        | keylet_code::ACCOUNT
        | keylet_code::HOOK => {
            require_zero(&[c, d, e, f])?;
            let id = read_account(mem, a, b)?;
            match keylet_type {
                keylet_code::OWNER_DIR => Keylet::owner_dir(&id),
                keylet_code::SIGNERS => Keylet::signers(&id),
                keylet_code::ACCOUNT => Keylet::account(&id),
                _ => Keylet::hook(&id),
            }
        }

        keylet_code::OFFER
        | keylet_code::CHECK
        | keylet_code::ESCROW
        | keylet_code::NFT_OFFER => {
            require_zero(&[e, f])?;
            let id = read_account(mem, a, b)?;
            let seq = read_seq(mem, c, d)?;
            match keylet_type {
                keylet_code::OFFER => Keylet::offer(&id, seq),
                keylet_code::CHECK => Keylet::check(&id, seq),
                keylet_code::ESCROW => Keylet::escrow(&id, seq),
                _ => Keylet::nft_offer(&id, seq),
            }
        }

        keylet_code::TICKET => {
            require_zero(&[d, e, f])?;
            Keylet::ticket(&read_account(mem, a, b)?, c)
        }

        keylet_code::PAGE => {
            require_zero(&[e, f])?;
            let root = read_hash(mem, a, b)?;
            Keylet::page(&root, ((c as u64) << 32) | d as u64)
        }

        keylet_code::HOOK_STATE => {
            if args.iter().any(|x| *x == 0) {
                return Err(ApiError::InvalidArgument);
            }
            let id = read_account(mem, a, b)?;
            let key = read_hash(mem, c, d)?;
            let namespace = read_hash(mem, e, f)?;
            Keylet::hook_state(&id, &key, &namespace)
        }

        keylet_code::HOOK_STATE_DIR => {
            require_zero(&[e, f])?;
            let id = read_account(mem, a, b)?;
            let namespace = read_hash(mem, c, d)?;
            Keylet::hook_state_dir(&id, &namespace)
        }

        keylet_code::SKIP => {
            require_zero(&[c, d, e, f])?;
            match b {
                0 => Keylet::skip(None),
                1 => Keylet::skip(Some(a)),
                _ => return Err(ApiError::InvalidArgument),
            }
        }

        keylet_code::AMENDMENTS
        | keylet_code::FEES
        | keylet_code::NEGATIVE_UNL
        | keylet_code::EMITTED_DIR => {
            require_zero(&args)?;
            match keylet_type {
                keylet_code::AMENDMENTS => Keylet::amendments(),
                keylet_code::FEES => Keylet::fees(),
                keylet_code::NEGATIVE_UNL => Keylet::negative_unl(),
                _ => Keylet::emitted_dir(),
            }
        }

        keylet_code::LINE => {
            if args.iter().any(|x| *x == 0) {
                return Err(ApiError::InvalidArgument);
            }
            let hi = read_account(mem, a, b)?;
            let lo = read_account(mem, c, d)?;
            mem.check(e, f)?;
            let currency = parse_currency(mem.read(e, f)?).ok_or(ApiError::InvalidArgument)?;
            Keylet::line(&hi, &lo, &currency)
        }

        keylet_code::DEPOSIT_PREAUTH => {
            require_zero(&[e, f])?;
            let owner = read_account(mem, a, b)?;
            let preauthorized = read_account(mem, c, d)?;
            Keylet::deposit_preauth(&owner, &preauthorized)
        }

        keylet_code::PAYCHAN => {
            if args[..5].iter().any(|x| *x == 0) {
                return Err(ApiError::InvalidArgument);
            }
            let src = read_account(mem, a, b)?;
            let dst = read_account(mem, c, d)?;
            let seq = read_seq(mem, e, f)?;
            Keylet::paychan(&src, &dst, seq)
        }

        _ => return Err(ApiError::NoSuchKeylet),
    };
    Ok(keylet)
}
