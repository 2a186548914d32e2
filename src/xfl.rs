//! XFL: the deterministic 64-bit decimal float used by hooks.
//!
//! Layout of a non-zero value:
//! - bit 63: always 0, so every valid value is a non-negative `i64`
//! - bit 62: sign, where 0 means negative
//! - bits 61..54: exponent biased by 97, covering -96..=80
//! - bits 53..0: mantissa in `[10^15, 10^16)`
//!
//! Zero is the all-zero bit pattern. Every operation rejects malformed
//! inputs with [`ApiError::InvalidFloat`] before touching them, and results
//! that underflow become zero rather than an error.
//!
//! `sum`, `compare` and `mulratio` go through [`Iou`], a rational
//! (mantissa, exponent) pair with the same normalization rules as the
//! ledger's issued-currency amounts, so results match the ledger bit for bit.
//! `log` and `root` bridge through IEEE doubles via `libm`.

use crate::api::{compare_mode, ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

pub const MIN_MANTISSA: u64 = 1_000_000_000_000_000;
pub const MAX_MANTISSA: u64 = 9_999_999_999_999_999;
pub const MIN_EXPONENT: i32 = -96;
pub const MAX_EXPONENT: i32 = 80;
const EXPONENT_BIAS: i32 = 97;
const SIGN_BIT: i64 = 1 << 62;
const MANTISSA_MASK: i64 = (1 << 54) - 1;

/// 1.0 as an XFL.
pub const ONE: i64 = SIGN_BIT | (((-15 + EXPONENT_BIAS) as i64) << 54) | MIN_MANTISSA as i64;

const POWERS_OF_TEN: [u64; 19] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
    10_000_000_000,
    100_000_000_000,
    1_000_000_000_000,
    10_000_000_000_000,
    100_000_000_000_000,
    1_000_000_000_000_000,
    10_000_000_000_000_000,
    100_000_000_000_000_000,
    1_000_000_000_000_000_000,
];

// ── raw field access ─────────────────────────────────────────────

pub fn mantissa_of(x: i64) -> u64 {
    if x <= 0 {
        return 0;
    }
    (x & MANTISSA_MASK) as u64
}

pub fn exponent_of(x: i64) -> i32 {
    if x <= 0 {
        return 0;
    }
    ((x >> 54) & 0xFF) as i32 - EXPONENT_BIAS
}

pub fn is_negative(x: i64) -> bool {
    (x >> 62) & 1 == 0
}

fn invert_sign(x: i64) -> i64 {
    x ^ SIGN_BIT
}

/// Reject encodings outside the valid domain.
pub fn check(x: i64) -> ApiResult<()> {
    if x < 0 {
        return Err(ApiError::InvalidFloat);
    }
    if x != 0 {
        let (man, exp) = (mantissa_of(x), exponent_of(x));
        if !(MIN_MANTISSA..=MAX_MANTISSA).contains(&man)
            || !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exp)
        {
            return Err(ApiError::InvalidFloat);
        }
    }
    Ok(())
}

/// Pack already-normalized parts. A zero mantissa yields canonical zero.
pub fn make_float(mantissa: u64, exponent: i32, negative: bool) -> ApiResult<i64> {
    if mantissa == 0 {
        return Ok(0);
    }
    if mantissa > MAX_MANTISSA {
        return Err(ApiError::MantissaOversized);
    }
    if mantissa < MIN_MANTISSA {
        return Err(ApiError::MantissaUndersized);
    }
    if exponent > MAX_EXPONENT {
        return Err(ApiError::ExponentOversized);
    }
    if exponent < MIN_EXPONENT {
        return Err(ApiError::ExponentUndersized);
    }
    let mut out = (((exponent + EXPONENT_BIAS) as i64) << 54) | mantissa as i64;
    if !negative {
        out |= SIGN_BIT;
    }
    Ok(out)
}

/// Scale `mantissa` into the valid range and pack it. Negative mantissas
/// set the sign. Underflow returns zero; overflow is `XFL_OVERFLOW`.
pub fn normalize(mantissa: i64, exponent: i32, negative: bool) -> ApiResult<i64> {
    if mantissa == 0 {
        return Ok(0);
    }
    let mut negative = negative;
    let mut man = if mantissa == i64::MIN { mantissa + 1 } else { mantissa };
    if man < 0 {
        man = -man;
        negative = true;
    }
    let mut exp = exponent;

    let order = libm::log10(man as f64) as i32;
    let adjust = 15 - order;
    if adjust > 0 {
        if adjust > 18 {
            return Ok(0);
        }
        man = man
            .checked_mul(POWERS_OF_TEN[adjust as usize] as i64)
            .ok_or(ApiError::XflOverflow)?;
        exp -= adjust;
    } else if adjust < 0 {
        if -adjust > 18 {
            return Err(ApiError::XflOverflow);
        }
        man /= POWERS_OF_TEN[(-adjust) as usize] as i64;
        exp -= adjust;
    }
    if man == 0 {
        return Ok(0);
    }

    // the scaling above can still be one place out
    let (min, max) = (MIN_MANTISSA as i64, MAX_MANTISSA as i64);
    if man < min {
        if man == min - 1 {
            man += 1;
        } else {
            man *= 10;
            exp -= 1;
        }
    }
    if man > max {
        if man == max + 1 {
            man -= 1;
        } else {
            man /= 10;
            exp += 1;
        }
    }

    if exp < MIN_EXPONENT || man == 0 {
        return Ok(0);
    }
    if exp > MAX_EXPONENT {
        return Err(ApiError::XflOverflow);
    }
    make_float(man as u64, exp, negative)
}

// ── issued-currency arithmetic ───────────────────────────────────

/// Signed decimal amount normalized the way the ledger normalizes
/// issued-currency values. Zero carries exponent -100.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Iou {
    mantissa: i64,
    exponent: i32,
}

impl Iou {
    const ZERO_EXPONENT: i32 = -100;

    pub fn zero() -> Self {
        Self {
            mantissa: 0,
            exponent: Self::ZERO_EXPONENT,
        }
    }

    pub fn new(mantissa: i64, exponent: i32) -> ApiResult<Self> {
        if mantissa == 0 {
            return Ok(Self::zero());
        }
        let negative = mantissa < 0;
        let mut man = mantissa.unsigned_abs();
        let mut exp = exponent;
        while man < MIN_MANTISSA && exp > MIN_EXPONENT {
            man *= 10;
            exp -= 1;
        }
        while man > MAX_MANTISSA {
            if exp >= MAX_EXPONENT {
                return Err(ApiError::XflOverflow);
            }
            man /= 10;
            exp += 1;
        }
        if exp < MIN_EXPONENT || man < MIN_MANTISSA {
            return Ok(Self::zero());
        }
        if exp > MAX_EXPONENT {
            return Err(ApiError::XflOverflow);
        }
        let man = man as i64;
        Ok(Self {
            mantissa: if negative { -man } else { man },
            exponent: exp,
        })
    }

    /// Signed view of a valid XFL.
    pub fn from_xfl(x: i64) -> ApiResult<Self> {
        let man = mantissa_of(x) as i64;
        Self::new(if is_negative(x) { -man } else { man }, exponent_of(x))
    }

    pub fn mantissa(&self) -> i64 {
        self.mantissa
    }

    pub fn exponent(&self) -> i32 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0
    }

    /// Pack into an XFL. Zero reports `EXPONENT_UNDERSIZED`, which callers
    /// treat as a legitimate zero.
    pub fn to_xfl(&self) -> ApiResult<i64> {
        if self.is_zero() {
            return Err(ApiError::ExponentUndersized);
        }
        make_float(self.mantissa.unsigned_abs(), self.exponent, self.mantissa < 0)
    }

    pub fn checked_add(self, other: Iou) -> ApiResult<Iou> {
        if other.is_zero() {
            return Ok(self);
        }
        if self.is_zero() {
            return Ok(other);
        }
        let (mut m1, mut e1) = (self.mantissa, self.exponent);
        let (mut m2, mut e2) = (other.mantissa, other.exponent);
        while e1 < e2 {
            m1 /= 10;
            e1 += 1;
        }
        while e2 < e1 {
            m2 /= 10;
            e2 += 1;
        }
        let total = m1 + m2;
        if (-10..=10).contains(&total) {
            return Ok(Self::zero());
        }
        Self::new(total, e1)
    }
}

impl PartialOrd for Iou {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Iou {
    fn cmp(&self, other: &Self) -> Ordering {
        if self == other {
            return Ordering::Equal;
        }
        let less = {
            let (lneg, rneg) = (self.mantissa < 0, other.mantissa < 0);
            if lneg != rneg {
                lneg
            } else if self.mantissa == 0 {
                other.mantissa > 0
            } else if other.mantissa == 0 {
                false
            } else if self.exponent > other.exponent {
                lneg
            } else if self.exponent < other.exponent {
                !lneg
            } else {
                self.mantissa < other.mantissa
            }
        };
        if less {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }
}

// ── operations exposed to hooks ──────────────────────────────────

/// `float_set`: build from parts, reporting underflow and overflow as
/// `INVALID_FLOAT`.
pub fn set(exponent: i32, mantissa: i64) -> ApiResult<i64> {
    if mantissa == 0 {
        return Ok(0);
    }
    match normalize(mantissa, exponent, false) {
        Ok(0) | Err(ApiError::XflOverflow) => Err(ApiError::InvalidFloat),
        other => other,
    }
}

fn multiply_parts(
    man1: u64,
    exp1: i32,
    neg1: bool,
    man2: u64,
    exp2: i32,
    neg2: bool,
) -> ApiResult<i64> {
    let product = man1 as u128 * man2 as u128 / POWERS_OF_TEN[15] as u128;
    let man = u64::try_from(product).map_err(|_| ApiError::XflOverflow)?;
    let exp = exp1 + exp2 + 15;
    match normalize(man as i64, exp, neg1 != neg2) {
        Err(ApiError::ExponentUndersized) => Ok(0),
        Err(ApiError::ExponentOversized) => Err(ApiError::XflOverflow),
        other => other,
    }
}

pub fn multiply(a: i64, b: i64) -> ApiResult<i64> {
    check(a)?;
    check(b)?;
    if a == 0 || b == 0 {
        return Ok(0);
    }
    multiply_parts(
        mantissa_of(a),
        exponent_of(a),
        is_negative(a),
        mantissa_of(b),
        exponent_of(b),
        is_negative(b),
    )
}

const POWERS_OF_TEN_WIDE: [u128; 30] = {
    let mut table = [1u128; 30];
    let mut i = 1;
    while i < 30 {
        table[i] = table[i - 1] * 10;
        i += 1;
    }
    table
};

/// Index of the first power of ten not below `v`.
fn log10_ceil(v: u128) -> i32 {
    POWERS_OF_TEN_WIDE.partition_point(|p| *p < v) as i32
}

/// Digits a positive `i64` mantissa may grow to during `mulratio`.
const I64_DIGITS: i32 = 18;

/// `float_mulratio`: multiply by `numerator / denominator` keeping as many
/// digits as an `i64` holds, optionally rounding away from zero.
pub fn mulratio(x: i64, round_up: bool, numerator: u32, denominator: u32) -> ApiResult<i64> {
    check(x)?;
    if x == 0 {
        return Ok(0);
    }
    if denominator == 0 {
        return Err(ApiError::DivisionByZero);
    }

    let den = denominator as u128;
    let product = mantissa_of(x) as u128 * numerator as u128;
    let mut low = product / den;
    let mut rem = product - low * den;
    let mut exponent = exponent_of(x);

    if rem != 0 {
        let room = I64_DIGITS - log10_ceil(low);
        if room > 0 {
            exponent -= room;
            low *= POWERS_OF_TEN_WIDE[room as usize];
            rem *= POWERS_OF_TEN_WIDE[room as usize];
        }
        let carry = rem / den;
        low += carry;
        rem -= carry * den;
    }

    let mut has_remainder = rem != 0;
    let shrink = log10_ceil(low) - I64_DIGITS;
    if shrink > 0 {
        let before = low;
        exponent += shrink;
        low /= POWERS_OF_TEN_WIDE[shrink as usize];
        if !has_remainder {
            has_remainder = before != low * POWERS_OF_TEN_WIDE[shrink as usize];
        }
    }

    let mantissa = i64::try_from(low).map_err(|_| ApiError::XflOverflow)?;
    let mut result = Iou::new(mantissa, exponent)?;
    if has_remainder && round_up {
        result = if result.is_zero() {
            Iou::new(MIN_MANTISSA as i64, MIN_EXPONENT)?
        } else {
            Iou::new(result.mantissa + 1, result.exponent)?
        };
    }
    make_float(result.mantissa.unsigned_abs(), result.exponent, is_negative(x))
}

pub fn negate(x: i64) -> ApiResult<i64> {
    if x == 0 {
        return Ok(0);
    }
    check(x)?;
    Ok(invert_sign(x))
}

/// `float_compare`: 1 when the relation selected by `mode` holds.
pub fn compare(a: i64, b: i64, mode: u32) -> ApiResult<i64> {
    check(a)?;
    check(b)?;
    let equal = mode & compare_mode::EQUAL != 0;
    let less = mode & compare_mode::LESS != 0;
    let greater = mode & compare_mode::GREATER != 0;
    let not_equal = less && greater;
    if (equal && less && greater) || mode == 0 {
        return Err(ApiError::InvalidArgument);
    }
    if mode & !0b111 != 0 {
        return Err(ApiError::InvalidArgument);
    }

    let (lhs, rhs) = (Iou::from_xfl(a)?, Iou::from_xfl(b)?);
    let holds = (not_equal && lhs != rhs)
        || (equal && lhs == rhs)
        || (greater && lhs > rhs)
        || (less && lhs < rhs);
    Ok(holds as i64)
}

pub fn sum(a: i64, b: i64) -> ApiResult<i64> {
    check(a)?;
    check(b)?;
    if a == 0 {
        return Ok(b);
    }
    if b == 0 {
        return Ok(a);
    }
    let total = Iou::from_xfl(a)?.checked_add(Iou::from_xfl(b)?)?;
    match total.to_xfl() {
        Err(ApiError::ExponentUndersized) => Ok(0),
        other => other,
    }
}

/// `float_int`: truncate to an integer scaled by `10^decimal_places`.
pub fn int(x: i64, decimal_places: u32, absolute: bool) -> ApiResult<i64> {
    check(x)?;
    if x == 0 {
        return Ok(0);
    }
    if decimal_places > 15 {
        return Err(ApiError::InvalidArgument);
    }
    if is_negative(x) && !absolute {
        return Err(ApiError::CantReturnNegative);
    }
    let shift = -(exponent_of(x) + decimal_places as i32);
    if shift > 15 {
        return Ok(0);
    }
    if shift < 0 {
        return Err(ApiError::TooBig);
    }
    Ok((mantissa_of(x) / POWERS_OF_TEN[shift as usize]) as i64)
}

/// Long division one decimal digit at a time.
pub fn divide(a: i64, b: i64) -> ApiResult<i64> {
    check(a)?;
    check(b)?;
    if b == 0 {
        return Err(ApiError::DivisionByZero);
    }
    if a == 0 {
        return Ok(0);
    }
    if b == ONE {
        return Ok(a);
    }

    let (mut man1, exp1, neg1) = (mantissa_of(a), exponent_of(a), is_negative(a));
    let (mut man2, mut exp2, neg2) = (mantissa_of(b), exponent_of(b), is_negative(b));

    let lhs = normalize(man1 as i64, exp1, false).map_err(|_| ApiError::InvalidFloat)?;
    normalize(man2 as i64, exp2, false).map_err(|_| ApiError::InvalidFloat)?;
    if lhs == 0 {
        return Ok(0);
    }

    while man2 > man1 {
        man2 /= 10;
        exp2 += 1;
    }
    if man2 == 0 {
        return Err(ApiError::DivisionByZero);
    }
    while man2 < man1 {
        if man2 * 10 > man1 {
            break;
        }
        man2 *= 10;
        exp2 -= 1;
    }

    let mut man3: u64 = 0;
    let mut exp3 = exp1 - exp2;
    while man2 > 0 {
        let mut digit = 0;
        while man1 > man2 {
            man1 -= man2;
            digit += 1;
        }
        man3 = man3 * 10 + digit;
        man2 /= 10;
        if man2 == 0 {
            break;
        }
        exp3 -= 1;
    }

    normalize(man3 as i64, exp3, neg1 != neg2)
}

pub fn invert(x: i64) -> ApiResult<i64> {
    if x == 0 {
        return Err(ApiError::DivisionByZero);
    }
    if x == ONE {
        return Ok(ONE);
    }
    divide(ONE, x)
}

pub fn mantissa(x: i64) -> ApiResult<i64> {
    check(x)?;
    Ok(mantissa_of(x) as i64)
}

pub fn sign(x: i64) -> ApiResult<i64> {
    check(x)?;
    if x == 0 {
        return Ok(0);
    }
    Ok(is_negative(x) as i64)
}

/// Best-effort conversion from an IEEE double.
pub fn from_f64(value: f64) -> ApiResult<i64> {
    if value == 0.0 {
        return Ok(0);
    }
    let negative = value < 0.0;
    let mut magnitude = value.abs();
    let mut exp = libm::log10(magnitude) as i32;
    magnitude *= libm::pow(10.0, (-exp + 15) as f64);
    let mut man = magnitude as i64;
    let (min, max) = (MIN_MANTISSA as i64, MAX_MANTISSA as i64);
    if man < min {
        if man == min - 1 {
            man += 1;
        } else {
            man = man.saturating_mul(10);
            exp -= 1;
        }
    }
    if man > max {
        if man == max + 1 {
            man -= 1;
        } else {
            man /= 10;
            exp += 1;
        }
    }
    exp -= 15;
    match make_float(man.max(0) as u64, exp, negative) {
        Err(ApiError::ExponentUndersized) => Ok(0),
        other => other,
    }
}

/// Base-10 logarithm.
pub fn log(x: i64) -> ApiResult<i64> {
    check(x)?;
    if x == 0 {
        return Err(ApiError::InvalidArgument);
    }
    if is_negative(x) {
        return Err(ApiError::ComplexNotSupported);
    }
    let result = libm::log10(mantissa_of(x) as f64) + exponent_of(x) as f64;
    from_f64(result)
}

/// `n`th root, `n >= 2`.
pub fn root(x: i64, n: u32) -> ApiResult<i64> {
    check(x)?;
    if x == 0 {
        return Ok(0);
    }
    if n < 2 {
        return Err(ApiError::InvalidArgument);
    }
    if is_negative(x) {
        return Err(ApiError::ComplexNotSupported);
    }
    let input = mantissa_of(x) as f64 * libm::pow(10.0, exponent_of(x) as f64);
    from_f64(libm::pow(input, 1.0 / n as f64))
}

// ── amount encodings ─────────────────────────────────────────────

/// Currency code from either 20 raw bytes or a three character ISO code.
pub fn parse_currency(bytes: &[u8]) -> Option<[u8; 20]> {
    match bytes.len() {
        20 => bytes.try_into().ok(),
        3 => {
            let valid = |c: u8| c.is_ascii_alphanumeric() || b"?!@#$%^&*<>(){}[]|".contains(&c);
            if !bytes.iter().all(|c| valid(*c)) {
                return None;
            }
            let mut out = [0u8; 20];
            out[12..15].copy_from_slice(bytes);
            Some(out)
        }
        _ => None,
    }
}

/// How `float_sto` should frame its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoTarget {
    /// Eight byte native amount, no header.
    Native,
    /// Eight byte issued amount, no header and no currency/issuer.
    Short,
    /// Full field: header, amount, currency, issuer.
    Field { type_code: u16, field: u16 },
}

impl StoTarget {
    pub fn from_field_code(field_code: u32) -> Self {
        match field_code {
            0 => StoTarget::Native,
            0xFFFF_FFFF => StoTarget::Short,
            code => StoTarget::Field {
                type_code: (code >> 16) as u16,
                field: (code & 0xFFFF) as u16,
            },
        }
    }

    fn header(self) -> Vec<u8> {
        let StoTarget::Field { type_code, field } = self else {
            return Vec::new();
        };
        let (t, f) = (type_code as u8, field as u8);
        match (type_code < 16, field < 16) {
            (true, true) => vec![(t << 4) + f],
            (true, false) => vec![t << 4, f],
            // escaped type: the field code lands in the high nibble
            (false, true) => vec![f << 4, t],
            (false, false) => vec![0, t, f],
        }
    }
}

/// `float_sto`: serialize an XFL as a ledger amount.
pub fn to_sto(
    x: i64,
    currency: Option<[u8; 20]>,
    issuer: Option<[u8; 20]>,
    target: StoTarget,
    capacity: usize,
) -> ApiResult<Vec<u8>> {
    check(x)?;
    let is_native = target == StoTarget::Native;
    let is_short = target == StoTarget::Short;
    let header = target.header();
    let mut needed = 8 + header.len();

    match (&currency, &issuer) {
        (Some(_), Some(_)) => {
            if is_native || is_short {
                return Err(ApiError::InvalidArgument);
            }
            needed += 40;
        }
        (None, None) => {
            if !is_native && !is_short {
                return Err(ApiError::InvalidArgument);
            }
        }
        _ => return Err(ApiError::InvalidArgument),
    }
    if needed > capacity {
        return Err(ApiError::TooSmall);
    }

    let mut man = mantissa_of(x);
    let exp = exponent_of(x);
    let negative = is_negative(x);
    let mut amount = [0u8; 8];
    if is_native {
        let shift = -exp;
        if shift > 15 {
            return Ok(Vec::new());
        }
        if shift < 0 {
            return Err(ApiError::XflOverflow);
        }
        man /= POWERS_OF_TEN[shift as usize];
        amount = man.to_be_bytes();
        amount[0] = (if negative { 0x00 } else { 0x40 }) + (amount[0] & 0x3F);
    } else if man == 0 {
        amount[0] = 0x80;
    } else {
        let biased = (exp + EXPONENT_BIAS) as u8;
        amount = man.to_be_bytes();
        amount[0] = (if negative { 0x80 } else { 0xC0 }) + (biased >> 2);
        amount[1] = ((biased & 0b11) << 6) + (amount[1] & 0x3F);
    }

    let mut out = header;
    out.extend_from_slice(&amount);
    if let (Some(currency), Some(issuer)) = (currency, issuer) {
        if !is_native && !is_short {
            out.extend_from_slice(&currency);
            out.extend_from_slice(&issuer);
        }
    }
    Ok(out)
}

/// `float_sto_set`: read an amount, with or without its field header.
pub fn from_sto(bytes: &[u8]) -> ApiResult<i64> {
    if bytes.len() < 8 {
        return Err(ApiError::NotAnObject);
    }
    let mut body = bytes;
    if bytes.len() > 8 {
        let (hi, lo) = (bytes[0] >> 4, bytes[0] & 0x0F);
        let skip = if hi == 0 && lo == 0 {
            3
        } else if hi == 0 || lo == 0 {
            2
        } else {
            1
        };
        if bytes.len() < 8 + skip {
            return Err(ApiError::NotAnObject);
        }
        body = &bytes[skip..];
    }

    let is_native = body[0] & 0x80 == 0;
    let negative = body[0] & 0x40 == 0;
    let exponent = if is_native {
        0
    } else {
        (((body[0] & 0x3F) as i32) << 2) + (body[1] >> 6) as i32 - EXPONENT_BIAS
    };
    let mantissa = body[2..8]
        .iter()
        .fold((body[1] & 0x3F) as u64, |acc, b| (acc << 8) | *b as u64);
    if mantissa == 0 {
        return Ok(0);
    }
    normalize(mantissa as i64, exponent, negative)
}

/// XFL view of an amount payload (8 byte native or 48 byte issued).
/// Native drops are scaled by `10^-6`.
pub fn from_amount(payload: &[u8]) -> ApiResult<i64> {
    let raw = payload
        .get(..8)
        .and_then(|b| <[u8; 8]>::try_from(b).ok())
        .map(u64::from_be_bytes)
        .ok_or(ApiError::NotAnAmount)?;
    let negative = raw & (1 << 62) == 0;
    if raw >> 63 == 0 {
        let drops = (raw & ((1 << 62) - 1)) as i64;
        let drops = if negative { -drops } else { drops };
        return match normalize(drops, -6, false) {
            Err(ApiError::ExponentUndersized) => Ok(0),
            other => other,
        };
    }
    let man = (raw & MANTISSA_MASK as u64) as i64;
    let exp = ((raw >> 54) & 0xFF) as i32 - EXPONENT_BIAS;
    let amount = Iou::new(if negative { -man } else { man }, exp)?;
    match amount.to_xfl() {
        Err(ApiError::ExponentUndersized) => Ok(0),
        other => other,
    }
}

// ── display ──────────────────────────────────────────────────────

/// Typed wrapper for inspecting XFL values outside the guest ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Xfl(pub i64);

impl Xfl {
    pub fn from_parts(mantissa: i64, exponent: i32) -> ApiResult<Self> {
        set(exponent, mantissa).map(Xfl)
    }

    pub fn is_valid(self) -> bool {
        check(self.0).is_ok()
    }

    pub fn mantissa(self) -> u64 {
        mantissa_of(self.0)
    }

    pub fn exponent(self) -> i32 {
        exponent_of(self.0)
    }

    pub fn is_negative(self) -> bool {
        self.0 != 0 && is_negative(self.0)
    }

    /// Lossy conversion for display and tests.
    pub fn to_f64(self) -> f64 {
        if self.0 == 0 {
            return 0.0;
        }
        let magnitude = self.mantissa() as f64 * libm::pow(10.0, self.exponent() as f64);
        if self.is_negative() {
            -magnitude
        } else {
            magnitude
        }
    }
}

impl fmt::Display for Xfl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return write!(f, "0");
        }
        if !self.is_valid() {
            return write!(f, "<invalid xfl {}>", self.0);
        }
        let sign = if self.is_negative() { "-" } else { "" };
        write!(f, "{}{}e{}", sign, self.mantissa(), self.exponent())
    }
}
