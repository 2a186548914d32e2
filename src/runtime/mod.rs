//! Guest execution.
//!
//! Sub-modules:
//! - [`executor`]: runs one hook, or an account's whole chain, against a
//!   [`GuestRuntime`].
//! - [`native`]: a runtime whose "bytecode" maps to host-native programs.
//! - [`result`]: chain outcomes and fee helpers.
//!
//! The engine never interprets WASM itself. Anything able to call
//! [`HookContext::call`] for each import and report how the guest ended can
//! sit behind [`GuestRuntime`].

pub mod executor;
pub mod native;
pub mod result;

pub use executor::{ChainRequest, HookExecutor};
pub use native::{Guest, NativeError, NativeHook, NativeRuntime};
pub use result::{creation_fee, execution_fee, ChainOutcome};

use crate::api::ExitType;
use crate::context::HookContext;
use crate::ledger::keylet::sha512_half;
use crate::ledger::Hash256;

/// Exported function a hook run starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Hook,
    Callback,
}

impl Entry {
    pub fn export_name(self) -> &'static str {
        match self {
            Entry::Hook => "hook",
            Entry::Callback => "cbak",
        }
    }
}

/// How the guest stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuestOutcome {
    /// The entry function returned without calling `accept` or `rollback`.
    Returned(i64),
    /// A host call ended the run.
    Terminated(ExitType),
    /// The guest faulted, or the runtime could not start it.
    Trapped(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestRun {
    pub outcome: GuestOutcome,
    pub instructions: u64,
}

impl GuestRun {
    pub fn trapped(message: impl Into<String>) -> Self {
        Self {
            outcome: GuestOutcome::Trapped(message.into()),
            instructions: 0,
        }
    }
}

pub trait GuestRuntime {
    /// Whether the module exports a function called `name`.
    fn exports(&self, bytecode: &[u8], name: &str) -> bool;

    /// Run `entry` with `argument`, routing every import through `host`.
    fn execute(
        &self,
        bytecode: &[u8],
        entry: Entry,
        argument: u32,
        host: &mut HookContext<'_>,
    ) -> GuestRun;
}

/// Hook hash of a module: SHA-512Half of its bytecode.
pub fn hook_hash(bytecode: &[u8]) -> Hash256 {
    sha512_half(&[bytecode])
}
