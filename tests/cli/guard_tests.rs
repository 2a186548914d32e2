use super::common::{guarded_hook, hook_engine, unguarded_hook, write_temp};
use predicates::prelude::*;

#[test]
fn test_guarded_hook_passes() {
    let file = write_temp(&guarded_hook());
    hook_engine()
        .arg("guard-check")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Callback: yes"))
        .stdout(predicate::str::contains("Worst-case guard budget: 11"))
        .stdout(predicate::str::contains("Guard check passed."));
}

#[test]
fn test_unguarded_loop_fails() {
    let file = write_temp(&unguarded_hook());
    hook_engine()
        .arg("guard-check")
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[UNGUARDED_LOOP]"))
        .stderr(predicate::str::contains("1 violation(s)"));
}

#[test]
fn test_reads_module_from_stdin() {
    hook_engine()
        .args(["guard-check", "-"])
        .write_stdin(guarded_hook())
        .assert()
        .success()
        .stdout(predicate::str::contains("Guard check passed."));
}

#[test]
fn test_missing_file_reports_path() {
    hook_engine()
        .args(["guard-check", "does/not/exist.wasm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read WASM file"));
}

#[test]
fn test_garbage_is_rejected() {
    let file = write_temp(b"definitely not wasm");
    hook_engine()
        .arg("guard-check")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid WASM"));
}
