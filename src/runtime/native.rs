//! Host-native guest programs.
//!
//! [`NativeRuntime`] maps module bytecode to Rust closures. The closures
//! get a [`Guest`] handle with their own linear memory and reach the host
//! the same way a WASM import would, so everything behind
//! [`HookContext::call`] is exercised without a WASM engine.

use super::{hook_hash, Entry, GuestOutcome, GuestRun, GuestRuntime};
use crate::context::HookContext;
use crate::host::{HostFunction, HostResult, Terminated};
use crate::ledger::Hash256;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// One WASM page.
pub const DEFAULT_MEMORY_SIZE: usize = 65_536;

/// How a native program stops early.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NativeError {
    #[error(transparent)]
    Terminated(#[from] Terminated),

    #[error("trap: {0}")]
    Trap(String),
}

type NativeFn = Arc<dyn Fn(&mut Guest<'_, '_>) -> Result<i64, NativeError> + Send + Sync>;

/// The running program's view of itself: memory, argument and the host.
pub struct Guest<'g, 'c> {
    memory: &'g mut [u8],
    host: &'g mut HookContext<'c>,
    argument: u32,
    instructions: u64,
}

impl Guest<'_, '_> {
    /// Argument passed to `hook` / `cbak`.
    pub fn argument(&self) -> u32 {
        self.argument
    }

    pub fn call(&mut self, function: HostFunction, args: &[i64]) -> HostResult {
        self.instructions += 1;
        self.host.call(self.memory, function, args)
    }

    pub fn call_by_name(&mut self, name: &str, args: &[i64]) -> HostResult {
        self.instructions += 1;
        self.host.call_by_name(self.memory, name, args)
    }

    /// Account for work done between host calls.
    pub fn charge(&mut self, instructions: u64) {
        self.instructions = self.instructions.saturating_add(instructions);
    }

    pub fn memory(&self) -> &[u8] {
        self.memory
    }

    pub fn read(&self, ptr: u32, len: u32) -> Result<&[u8], NativeError> {
        let start = ptr as usize;
        let end = start.saturating_add(len as usize);
        self.memory
            .get(start..end)
            .ok_or_else(|| NativeError::Trap(format!("read of {len} bytes at {ptr} out of bounds")))
    }

    pub fn write(&mut self, ptr: u32, data: &[u8]) -> Result<(), NativeError> {
        let start = ptr as usize;
        let end = start.saturating_add(data.len());
        let target = self.memory.get_mut(start..end).ok_or_else(|| {
            NativeError::Trap(format!("write of {} bytes at {ptr} out of bounds", data.len()))
        })?;
        target.copy_from_slice(data);
        Ok(())
    }
}

/// A registered program: `hook` and optionally `cbak`.
#[derive(Clone)]
pub struct NativeHook {
    hook: NativeFn,
    cbak: Option<NativeFn>,
    memory_size: usize,
}

impl NativeHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&mut Guest<'_, '_>) -> Result<i64, NativeError> + Send + Sync + 'static,
    {
        Self {
            hook: Arc::new(hook),
            cbak: None,
            memory_size: DEFAULT_MEMORY_SIZE,
        }
    }

    pub fn with_callback<F>(mut self, cbak: F) -> Self
    where
        F: Fn(&mut Guest<'_, '_>) -> Result<i64, NativeError> + Send + Sync + 'static,
    {
        self.cbak = Some(Arc::new(cbak));
        self
    }

    pub fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    fn entry(&self, entry: Entry) -> Option<&NativeFn> {
        match entry {
            Entry::Hook => Some(&self.hook),
            Entry::Callback => self.cbak.as_ref(),
        }
    }
}

impl fmt::Debug for NativeHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeHook")
            .field("has_callback", &self.cbak.is_some())
            .field("memory_size", &self.memory_size)
            .finish()
    }
}

/// Programs keyed by the hook hash of the bytecode they stand in for.
#[derive(Debug, Clone, Default)]
pub struct NativeRuntime {
    programs: HashMap<Hash256, NativeHook>,
}

impl NativeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `program` for `bytecode` and return the hook hash.
    pub fn register(&mut self, bytecode: &[u8], program: NativeHook) -> Hash256 {
        let hash = hook_hash(bytecode);
        self.programs.insert(hash, program);
        hash
    }

    pub fn with_program(mut self, bytecode: &[u8], program: NativeHook) -> Self {
        self.register(bytecode, program);
        self
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl GuestRuntime for NativeRuntime {
    fn exports(&self, bytecode: &[u8], name: &str) -> bool {
        let Some(program) = self.programs.get(&hook_hash(bytecode)) else {
            return false;
        };
        match name {
            "hook" => true,
            "cbak" => program.cbak.is_some(),
            _ => false,
        }
    }

    fn execute(
        &self,
        bytecode: &[u8],
        entry: Entry,
        argument: u32,
        host: &mut HookContext<'_>,
    ) -> GuestRun {
        let Some(program) = self.programs.get(&hook_hash(bytecode)) else {
            return GuestRun::trapped("no native program registered for module");
        };
        let Some(function) = program.entry(entry) else {
            return GuestRun::trapped(format!("module does not export {}", entry.export_name()));
        };

        let mut memory = vec![0u8; program.memory_size];
        let mut guest = Guest {
            memory: &mut memory,
            host,
            argument,
            instructions: 0,
        };
        let outcome = match function(&mut guest) {
            Ok(value) => GuestOutcome::Returned(value),
            Err(NativeError::Terminated(Terminated(exit))) => GuestOutcome::Terminated(exit),
            Err(NativeError::Trap(message)) => GuestOutcome::Trapped(message),
        };
        GuestRun {
            outcome,
            instructions: guest.instructions,
        }
    }
}
