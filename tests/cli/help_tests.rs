use super::common::hook_engine;
use predicates::prelude::*;

#[test]
fn test_help_lists_subcommands() {
    hook_engine()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("guard-check"))
        .stdout(predicate::str::contains("sto"))
        .stdout(predicate::str::contains("xfl"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    hook_engine()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_unknown_subcommand_fails() {
    hook_engine()
        .arg("deploy")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_quiet_and_verbose_conflict() {
    hook_engine()
        .args(["--quiet", "--verbose", "config"])
        .assert()
        .failure();
}
