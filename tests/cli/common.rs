//! Helpers shared by the CLI tests.

#![allow(dead_code)]

use assert_cmd::Command;
use std::io::Write;
use tempfile::NamedTempFile;

pub fn hook_engine() -> Command {
    Command::cargo_bin("hook-engine").unwrap()
}

fn section(id: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![id, body.len() as u8];
    out.extend_from_slice(body);
    out
}

fn name(s: &str) -> Vec<u8> {
    let mut out = vec![s.len() as u8];
    out.extend_from_slice(s.as_bytes());
    out
}

/// Minimal module: the given `env` imports, one `(i32) -> i64` function
/// exported under every name in `exports`, with `code` as its body.
pub fn module(imports: &[&str], exports: &[&str], code: &[u8]) -> Vec<u8> {
    let mut wasm = b"\0asm\x01\0\0\0".to_vec();
    wasm.extend(section(
        1,
        &[0x02, 0x60, 0x01, 0x7F, 0x01, 0x7E, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F],
    ));
    let mut body = vec![imports.len() as u8];
    for field in imports {
        body.extend(name("env"));
        body.extend(name(field));
        body.extend([0x00, 0x01]);
    }
    wasm.extend(section(2, &body));
    wasm.extend(section(3, &[0x01, 0x00]));
    let mut body = vec![exports.len() as u8];
    for export in exports {
        body.extend(name(export));
        body.extend([0x00, imports.len() as u8]);
    }
    wasm.extend(section(7, &body));
    let mut func = vec![0x00];
    func.extend_from_slice(code);
    let mut body = vec![0x01, func.len() as u8];
    body.extend(func);
    wasm.extend(section(10, &body));
    wasm
}

/// `loop { _g(1, 11) } ; i64.const 0`
pub const GUARDED_BODY: &[u8] = &[
    0x03, 0x40, 0x41, 0x01, 0x41, 0x0B, 0x10, 0x00, 0x1A, 0x0B, 0x42, 0x00, 0x0B,
];

/// `loop {} ; i64.const 0`
pub const UNGUARDED_BODY: &[u8] = &[0x03, 0x40, 0x0B, 0x42, 0x00, 0x0B];

pub fn guarded_hook() -> Vec<u8> {
    module(&["_g", "accept"], &["hook", "cbak"], GUARDED_BODY)
}

pub fn unguarded_hook() -> Vec<u8> {
    module(&["_g"], &["hook"], UNGUARDED_BODY)
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(bytes).unwrap();
    file.flush().unwrap();
    file
}

/// `TransactionType`, `Sequence` and `Account` fields.
pub fn sample_object_hex() -> String {
    format!("12000024000000058114{}", "A1".repeat(20))
}
