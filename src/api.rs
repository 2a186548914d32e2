//! Guest-visible return codes and exit types.
//!
//! Every host function returns an `i64`. Non-negative values are payloads
//! (byte counts, slot numbers, XFL values); negative values are drawn from
//! [`ApiError`]. The numbering is part of the guest ABI and never changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error sentinels returned to guest code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum ApiError {
    #[error("pointer and length fall outside guest memory")]
    OutOfBounds = -1,
    #[error("internal error")]
    InternalError = -2,
    #[error("too big")]
    TooBig = -3,
    #[error("too small")]
    TooSmall = -4,
    #[error("doesn't exist")]
    DoesntExist = -5,
    #[error("no free slots")]
    NoFreeSlots = -6,
    #[error("invalid argument")]
    InvalidArgument = -7,
    #[error("already set")]
    AlreadySet = -8,
    #[error("prerequisite not met")]
    PrerequisiteNotMet = -9,
    #[error("fee too large")]
    FeeTooLarge = -10,
    #[error("emission failure")]
    EmissionFailure = -11,
    #[error("too many nonces")]
    TooManyNonces = -12,
    #[error("too many emitted transactions")]
    TooManyEmittedTxn = -13,
    #[error("not implemented")]
    NotImplemented = -14,
    #[error("invalid account")]
    InvalidAccount = -15,
    #[error("guard violation")]
    GuardViolation = -16,
    #[error("invalid field")]
    InvalidField = -17,
    #[error("parse error")]
    ParseError = -18,
    #[error("rollback")]
    RcRollback = -19,
    #[error("accept")]
    RcAccept = -20,
    #[error("no such keylet")]
    NoSuchKeylet = -21,
    #[error("not an array")]
    NotAnArray = -22,
    #[error("not an object")]
    NotAnObject = -23,
    #[error("invalid float")]
    InvalidFloat = -10024,
    #[error("division by zero")]
    DivisionByZero = -25,
    #[error("mantissa oversized")]
    MantissaOversized = -26,
    #[error("mantissa undersized")]
    MantissaUndersized = -27,
    #[error("exponent oversized")]
    ExponentOversized = -28,
    #[error("exponent undersized")]
    ExponentUndersized = -29,
    #[error("xfl overflow")]
    XflOverflow = -30,
    #[error("not an IOU amount")]
    NotIouAmount = -31,
    #[error("not an amount")]
    NotAnAmount = -32,
    #[error("can't return negative")]
    CantReturnNegative = -33,
    #[error("not authorized")]
    NotAuthorized = -34,
    #[error("previous failure prevents retry")]
    PreviousFailurePreventsRetry = -35,
    #[error("too many params")]
    TooManyParams = -36,
    #[error("invalid transaction")]
    InvalidTxn = -37,
    #[error("reserve insufficient")]
    ReserveInsufficient = -38,
    #[error("complex not supported")]
    ComplexNotSupported = -39,
    #[error("does not match")]
    DoesNotMatch = -40,
    #[error("invalid key")]
    InvalidKey = -41,
    #[error("not a string")]
    NotAString = -42,
    #[error("memory regions overlap")]
    MemOverlap = -43,
    #[error("too many state modifications")]
    TooManyStateModifications = -44,
    #[error("too many namespaces")]
    TooManyNamespaces = -45,
}

impl ApiError {
    /// The ABI value handed back to the guest.
    pub fn code(self) -> i64 {
        self as i64
    }

    /// Upper-case ABI name, as used in hook headers and trace output.
    pub fn name(self) -> &'static str {
        match self {
            ApiError::OutOfBounds => "OUT_OF_BOUNDS",
            ApiError::InternalError => "INTERNAL_ERROR",
            ApiError::TooBig => "TOO_BIG",
            ApiError::TooSmall => "TOO_SMALL",
            ApiError::DoesntExist => "DOESNT_EXIST",
            ApiError::NoFreeSlots => "NO_FREE_SLOTS",
            ApiError::InvalidArgument => "INVALID_ARGUMENT",
            ApiError::AlreadySet => "ALREADY_SET",
            ApiError::PrerequisiteNotMet => "PREREQUISITE_NOT_MET",
            ApiError::FeeTooLarge => "FEE_TOO_LARGE",
            ApiError::EmissionFailure => "EMISSION_FAILURE",
            ApiError::TooManyNonces => "TOO_MANY_NONCES",
            ApiError::TooManyEmittedTxn => "TOO_MANY_EMITTED_TXN",
            ApiError::NotImplemented => "NOT_IMPLEMENTED",
            ApiError::InvalidAccount => "INVALID_ACCOUNT",
            ApiError::GuardViolation => "GUARD_VIOLATION",
            ApiError::InvalidField => "INVALID_FIELD",
            ApiError::ParseError => "PARSE_ERROR",
            ApiError::RcRollback => "RC_ROLLBACK",
            ApiError::RcAccept => "RC_ACCEPT",
            ApiError::NoSuchKeylet => "NO_SUCH_KEYLET",
            ApiError::NotAnArray => "NOT_AN_ARRAY",
            ApiError::NotAnObject => "NOT_AN_OBJECT",
            ApiError::InvalidFloat => "INVALID_FLOAT",
            ApiError::DivisionByZero => "DIVISION_BY_ZERO",
            ApiError::MantissaOversized => "MANTISSA_OVERSIZED",
            ApiError::MantissaUndersized => "MANTISSA_UNDERSIZED",
            ApiError::ExponentOversized => "EXPONENT_OVERSIZED",
            ApiError::ExponentUndersized => "EXPONENT_UNDERSIZED",
            ApiError::XflOverflow => "XFL_OVERFLOW",
            ApiError::NotIouAmount => "NOT_IOU_AMOUNT",
            ApiError::NotAnAmount => "NOT_AN_AMOUNT",
            ApiError::CantReturnNegative => "CANT_RETURN_NEGATIVE",
            ApiError::NotAuthorized => "NOT_AUTHORIZED",
            ApiError::PreviousFailurePreventsRetry => "PREVIOUS_FAILURE_PREVENTS_RETRY",
            ApiError::TooManyParams => "TOO_MANY_PARAMS",
            ApiError::InvalidTxn => "INVALID_TXN",
            ApiError::ReserveInsufficient => "RESERVE_INSUFFICIENT",
            ApiError::ComplexNotSupported => "COMPLEX_NOT_SUPPORTED",
            ApiError::DoesNotMatch => "DOES_NOT_MATCH",
            ApiError::InvalidKey => "INVALID_KEY",
            ApiError::NotAString => "NOT_A_STRING",
            ApiError::MemOverlap => "MEM_OVERLAP",
            ApiError::TooManyStateModifications => "TOO_MANY_STATE_MODIFICATIONS",
            ApiError::TooManyNamespaces => "TOO_MANY_NAMESPACES",
        }
    }
}

/// Result of an individual host-function body.
pub type ApiResult<T = i64> = std::result::Result<T, ApiError>;

/// Flatten a host-function result into the `i64` the guest receives.
pub fn to_return_value(result: ApiResult<i64>) -> i64 {
    match result {
        Ok(value) => value,
        Err(e) => e.code(),
    }
}

/// How a hook execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ExitType {
    Unset = 0,
    WasmError = 1,
    Rollback = 2,
    Accept = 3,
    JsvmError = 4,
    LedgerError = 5,
}

impl ExitType {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Anything but an explicit accept discards the hook's side effects.
    pub fn is_accept(self) -> bool {
        matches!(self, ExitType::Accept)
    }
}

impl fmt::Display for ExitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitType::Unset => "UNSET",
            ExitType::WasmError => "WASM_ERROR",
            ExitType::Rollback => "ROLLBACK",
            ExitType::Accept => "ACCEPT",
            ExitType::JsvmError => "JSVM_ERROR",
            ExitType::LedgerError => "LEDGER_ERROR",
        };
        write!(f, "{}", s)
    }
}

/// Comparison mode bits for `float_compare`.
pub mod compare_mode {
    pub const EQUAL: u32 = 0b001;
    pub const LESS: u32 = 0b010;
    pub const GREATER: u32 = 0b100;
}

/// Informational flags recorded in execution metadata.
pub mod execution_flags {
    pub const STRONG: u32 = 0b001;
    pub const CALLBACK: u32 = 0b010;
    pub const AGAIN_AS_WEAK: u32 = 0b100;
}
