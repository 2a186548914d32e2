//! Host-side execution engine for ledger hooks.
//!
//! A hook is a small WASM program attached to an account. The engine
//! exposes the host function surface hooks call into ([`host`]), keeps the
//! per-execution bookkeeping ([`context`], [`slot`], [`state`], [`emit`])
//! and runs whole hook chains through a pluggable guest runtime
//! ([`runtime`]). Results are folded back into the ledger by [`commit`].

pub mod analyzer;
pub mod api;
pub mod cli;
pub mod commit;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod guard;
pub mod host;
pub mod ledger;
pub mod memory;
pub mod runtime;
pub mod slot;
pub mod state;
pub mod sto;
pub mod xfl;

pub use error::{EngineError, Result};
