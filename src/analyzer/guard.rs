use crate::host::HostFunction;
use crate::{EngineError, Result};
use serde::Serialize;
use std::fmt;
use wasmparser::{ExternalKind, Operator, Parser, Payload, TypeRef};

/// Import module every host function lives in.
pub const HOST_MODULE: &str = "env";

/// A rule the module breaks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuardViolation {
    ForeignImportModule { module: String, name: String },
    UnknownImport { name: String },
    NonFunctionImport { name: String },
    MissingGuardImport,
    MissingHookExport,
    UnexpectedExport { name: String },
    UnguardedLoop { function: u32, offset: usize },
}

impl fmt::Display for GuardViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardViolation::ForeignImportModule { module, name } => {
                write!(f, "[IMPORT_MODULE] {}.{}: only `{}` is allowed", module, name, HOST_MODULE)
            }
            GuardViolation::UnknownImport { name } => {
                write!(f, "[UNKNOWN_IMPORT] {}", name)
            }
            GuardViolation::NonFunctionImport { name } => {
                write!(f, "[IMPORT_KIND] {} is not a function", name)
            }
            GuardViolation::MissingGuardImport => write!(f, "[NO_GUARD] `_g` is not imported"),
            GuardViolation::MissingHookExport => write!(f, "[NO_HOOK] `hook` is not exported"),
            GuardViolation::UnexpectedExport { name } => {
                write!(f, "[EXPORT] {} is neither `hook` nor `cbak`", name)
            }
            GuardViolation::UnguardedLoop { function, offset } => {
                write!(f, "[UNGUARDED_LOOP] function {} at offset 0x{:x}", function, offset)
            }
        }
    }
}

/// Outcome of checking one module.
#[derive(Debug, Clone, Serialize)]
pub struct GuardReport {
    pub valid: bool,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub has_callback: bool,
    pub loops: usize,
    /// Largest product of `maxiter` values along any loop nesting.
    pub worst_case_guard_budget: u64,
    pub violations: Vec<GuardViolation>,
}

/// What the next operators of a freshly opened loop must be.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Id,
    MaxIterations,
    GuardCall(u32),
}

#[derive(Debug)]
struct PendingLoop {
    offset: usize,
    expect: Expect,
}

/// Static validation of hook bytecode: imports, exports and loop guards.
pub struct GuardChecker;

impl GuardChecker {
    pub fn check(wasm: &[u8]) -> Result<GuardReport> {
        let mut report = GuardReport {
            valid: false,
            imports: Vec::new(),
            exports: Vec::new(),
            has_callback: false,
            loops: 0,
            worst_case_guard_budget: 0,
            violations: Vec::new(),
        };
        let mut imported_functions = 0u32;
        let mut guard_index = None;
        let mut defined = 0u32;

        for payload in Parser::new(0).parse_all(wasm) {
            match payload.map_err(invalid)? {
                Payload::ImportSection(reader) => {
                    for import in reader {
                        let import = import.map_err(invalid)?;
                        let is_function = matches!(import.ty, TypeRef::Func(_));
                        if import.module != HOST_MODULE {
                            report.violations.push(GuardViolation::ForeignImportModule {
                                module: import.module.to_string(),
                                name: import.name.to_string(),
                            });
                        } else if !is_function {
                            report.violations.push(GuardViolation::NonFunctionImport {
                                name: import.name.to_string(),
                            });
                        } else if HostFunction::from_name(import.name).is_none() {
                            report.violations.push(GuardViolation::UnknownImport {
                                name: import.name.to_string(),
                            });
                        }
                        if is_function {
                            if import.module == HOST_MODULE
                                && import.name == HostFunction::Guard.name()
                            {
                                guard_index = Some(imported_functions);
                            }
                            imported_functions += 1;
                        }
                        report.imports.push(import.name.to_string());
                    }
                }
                Payload::ExportSection(reader) => {
                    for export in reader {
                        let export = export.map_err(invalid)?;
                        if export.kind != ExternalKind::Func {
                            continue;
                        }
                        match export.name {
                            "hook" => {}
                            "cbak" => report.has_callback = true,
                            other => report.violations.push(GuardViolation::UnexpectedExport {
                                name: other.to_string(),
                            }),
                        }
                        report.exports.push(export.name.to_string());
                    }
                }
                Payload::CodeSectionEntry(body) => {
                    let function = imported_functions + defined;
                    defined += 1;
                    let mut reader = body.get_operators_reader().map_err(invalid)?;
                    let mut checker = LoopChecker::new(function, guard_index);
                    while !reader.eof() {
                        let (op, offset) = reader.read_with_offset().map_err(invalid)?;
                        checker.visit(&op, offset);
                    }
                    report.loops += checker.loops;
                    report.worst_case_guard_budget =
                        report.worst_case_guard_budget.max(checker.worst_budget);
                    report.violations.extend(checker.violations);
                }
                _ => {}
            }
        }

        if guard_index.is_none() {
            report.violations.push(GuardViolation::MissingGuardImport);
        }
        if !report.exports.iter().any(|name| name == "hook") {
            report.violations.push(GuardViolation::MissingHookExport);
        }
        report.valid = report.violations.is_empty();
        Ok(report)
    }
}

fn invalid(e: wasmparser::BinaryReaderError) -> EngineError {
    EngineError::InvalidWasm(e.to_string())
}

/// Walks one function body. Every loop must open with
/// `i32.const id; i32.const maxiter; call _g`.
struct LoopChecker {
    function: u32,
    guard_index: Option<u32>,
    /// Iteration multiplier per open block; 1 for anything but a guarded loop.
    frames: Vec<u64>,
    pending: Option<PendingLoop>,
    loops: usize,
    worst_budget: u64,
    violations: Vec<GuardViolation>,
}

impl LoopChecker {
    fn new(function: u32, guard_index: Option<u32>) -> Self {
        Self {
            function,
            guard_index,
            frames: Vec::new(),
            pending: None,
            loops: 0,
            worst_budget: 0,
            violations: Vec::new(),
        }
    }

    fn visit(&mut self, op: &Operator<'_>, offset: usize) {
        if let Some(pending) = self.pending.take() {
            self.advance(pending, op);
        }
        match op {
            Operator::Loop { .. } => {
                self.loops += 1;
                self.frames.push(1);
                self.pending = Some(PendingLoop {
                    offset,
                    expect: Expect::Id,
                });
            }
            Operator::Block { .. } | Operator::If { .. } => self.frames.push(1),
            Operator::End => {
                self.frames.pop();
            }
            _ => {}
        }
    }

    fn advance(&mut self, pending: PendingLoop, op: &Operator<'_>) {
        let next = match (pending.expect, op) {
            (Expect::Id, Operator::I32Const { .. }) => Some(Expect::MaxIterations),
            (Expect::MaxIterations, Operator::I32Const { value }) => {
                Some(Expect::GuardCall(*value as u32))
            }
            (Expect::GuardCall(max), Operator::Call { function_index })
                if Some(*function_index) == self.guard_index =>
            {
                if let Some(frame) = self.frames.last_mut() {
                    *frame = max as u64;
                }
                let budget = self
                    .frames
                    .iter()
                    .fold(1u64, |total, factor| total.saturating_mul(*factor));
                self.worst_budget = self.worst_budget.max(budget);
                None
            }
            _ => {
                self.violations.push(GuardViolation::UnguardedLoop {
                    function: self.function,
                    offset: pending.offset,
                });
                None
            }
        };
        if let Some(expect) = next {
            self.pending = Some(PendingLoop {
                offset: pending.offset,
                expect,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// A module with one defined function, exported under each name in
    /// `exports`. Every import uses the `(i32, i32) -> i32` type.
    fn module(imports: &[(&str, &str)], exports: &[&str], code: &[u8]) -> Vec<u8> {
        let mut wasm = b"\0asm\x01\0\0\0".to_vec();
        wasm.extend(section(
            1,
            &[0x02, 0x60, 0x01, 0x7F, 0x01, 0x7E, 0x60, 0x02, 0x7F, 0x7F, 0x01, 0x7F],
        ));
        let mut body = vec![imports.len() as u8];
        for (module, field) in imports {
            body.extend(name(module));
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

    const GUARDED_LOOP: &[u8] = &[
        0x03, 0x40, // loop
        0x41, 0x01, 0x41, 0x0B, 0x10, 0x00, 0x1A, // _g(1, 11); drop
        0x0B, // end
        0x42, 0x00, 0x0B,
    ];

    #[test]
    fn test_guarded_hook_passes() {
        let wasm = module(&[("env", "_g"), ("env", "accept")], &["hook", "cbak"], GUARDED_LOOP);
        let report = GuardChecker::check(&wasm).unwrap();
        assert!(report.valid, "{:?}", report.violations);
        assert!(report.has_callback);
        assert_eq!(report.loops, 1);
        assert_eq!(report.worst_case_guard_budget, 11);
    }

    #[test]
    fn test_unguarded_loop_reported() {
        let code = [0x03, 0x40, 0x0B, 0x42, 0x00, 0x0B];
        let wasm = module(&[("env", "_g")], &["hook"], &code);
        let report = GuardChecker::check(&wasm).unwrap();
        assert!(!report.valid);
        assert!(matches!(
            report.violations[0],
            GuardViolation::UnguardedLoop { function: 1, .. }
        ));
    }

    #[test]
    fn test_nested_budget_multiplies() {
        let code = [
            0x03, 0x40, 0x41, 0x01, 0x41, 0x05, 0x10, 0x00, 0x1A, // outer, 5
            0x03, 0x40, 0x41, 0x02, 0x41, 0x03, 0x10, 0x00, 0x1A, // inner, 3
            0x0B, 0x0B, 0x42, 0x00, 0x0B,
        ];
        let wasm = module(&[("env", "_g")], &["hook"], &code);
        let report = GuardChecker::check(&wasm).unwrap();
        assert!(report.valid);
        assert_eq!(report.loops, 2);
        assert_eq!(report.worst_case_guard_budget, 15);
    }

    #[test]
    fn test_import_and_export_rules() {
        let wasm = module(
            &[("wasi", "fd_write"), ("env", "printf")],
            &["main"],
            &[0x42, 0x00, 0x0B],
        );
        let report = GuardChecker::check(&wasm).unwrap();
        let text: Vec<String> = report.violations.iter().map(|v| v.to_string()).collect();
        assert!(text.iter().any(|t| t.starts_with("[IMPORT_MODULE]")));
        assert!(text.iter().any(|t| t == "[UNKNOWN_IMPORT] printf"));
        assert!(report.violations.contains(&GuardViolation::MissingGuardImport));
        assert!(report.violations.contains(&GuardViolation::MissingHookExport));
        assert!(report.violations.contains(&GuardViolation::UnexpectedExport {
            name: "main".into()
        }));
    }

    #[test]
    fn test_garbage_is_invalid_wasm() {
        assert!(matches!(
            GuardChecker::check(b"not wasm"),
            Err(EngineError::InvalidWasm(_))
        ));
    }
}
