use super::common::{hook_engine, write_temp};
use predicates::prelude::*;

#[test]
fn test_default_config_printed_as_toml() {
    hook_engine()
        .env_remove("HOOK_ENGINE_CONFIG")
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_slots = 255"))
        .stdout(predicate::str::contains("max_emit_generation = 10"));
}

#[test]
fn test_config_file_overrides_defaults() {
    let file = write_temp(b"max_slots = 12\nmax_ledger_lookahead = 3\n");
    hook_engine()
        .arg("config")
        .arg("--file")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("max_slots = 12"))
        .stdout(predicate::str::contains("max_ledger_lookahead = 3"))
        .stdout(predicate::str::contains("max_nonce = 255"));
}

#[test]
fn test_config_file_from_environment() {
    let file = write_temp(b"max_emit = 4\n");
    hook_engine()
        .env("HOOK_ENGINE_CONFIG", file.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_emit = 4"));
}

#[test]
fn test_unknown_config_key_rejected() {
    let file = write_temp(b"max_everything = 1\n");
    hook_engine()
        .arg("config")
        .arg("--file")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_everything"));
}
