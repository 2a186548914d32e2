//! Guest logging. Everything lands on the `hook_engine::trace` target so it
//! can be filtered separately from engine logs.

use crate::api::ApiResult;
use crate::context::HookContext;
use crate::memory::GuestMemory;
use crate::xfl;
use tracing::debug;

const MAX_MESSAGE: u32 = 128;
const MAX_DATA: u32 = 1023;

/// Guest strings are usually NUL-terminated.
fn message(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(&[0]).unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

/// `Float [-]mantissa*10^(exponent)` rendering used by `trace_float`.
pub fn describe_float(float: i64) -> String {
    if float == 0 {
        return "Float 0*10^(0) <ZERO>".to_string();
    }
    if xfl::check(float).is_err() {
        return "Float <INVALID>".to_string();
    }
    format!(
        "Float {}{}*10^({})",
        if xfl::is_negative(float) { "-" } else { "" },
        xfl::mantissa_of(float),
        xfl::exponent_of(float)
    )
}

impl HookContext<'_> {
    pub(crate) fn trace(
        &mut self,
        mem: &GuestMemory<'_>,
        (mread_ptr, mread_len): (u32, u32),
        (dread_ptr, dread_len): (u32, u32),
        as_hex: bool,
    ) -> ApiResult<i64> {
        let msg = mem.read(mread_ptr, mread_len.min(MAX_MESSAGE))?;
        let data = mem.read(dread_ptr, dread_len.min(MAX_DATA))?;
        let data = if as_hex {
            hex::encode_upper(data)
        } else {
            message(data)
        };
        debug!(
            target: "hook_engine::trace",
            account = %hex::encode_upper(self.result.account),
            "{}: {}",
            message(msg),
            data
        );
        Ok(0)
    }

    pub(crate) fn trace_num(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        number: i64,
    ) -> ApiResult<i64> {
        let msg = message(mem.read(read_ptr, read_len.min(MAX_MESSAGE))?);
        if msg.is_empty() {
            debug!(target: "hook_engine::trace", "{}", number);
        } else {
            debug!(target: "hook_engine::trace", "{}: {}", msg, number);
        }
        Ok(0)
    }

    pub(crate) fn trace_float(
        &mut self,
        mem: &GuestMemory<'_>,
        read_ptr: u32,
        read_len: u32,
        float: i64,
    ) -> ApiResult<i64> {
        let msg = message(mem.read(read_ptr, read_len.min(MAX_MESSAGE))?);
        debug!(target: "hook_engine::trace", "{}: {}", msg, describe_float(float));
        Ok(0)
    }
}
