use super::common::{hook_engine, sample_object_hex};
use predicates::prelude::*;

#[test]
fn test_sto_validate() {
    hook_engine()
        .args(["sto", "validate", &sample_object_hex()])
        .assert()
        .success()
        .stdout(predicate::str::diff("valid\n"));

    hook_engine()
        .args(["sto", "validate", "1200"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("invalid"));
}

#[test]
fn test_sto_field_by_name_and_id() {
    let hex = sample_object_hex();
    hook_engine()
        .args(["sto", "field", &hex, "Account"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Field:   Account"))
        .stdout(predicate::str::contains("A1".repeat(20)));

    hook_engine()
        .args(["sto", "field", &hex, "0x20004"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Payload: 00000005"));
}

#[test]
fn test_sto_missing_field() {
    hook_engine()
        .args(["sto", "field", &sample_object_hex(), "Destination"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DOESNT_EXIST"));
}

#[test]
fn test_sto_rejects_bad_hex() {
    hook_engine()
        .args(["sto", "validate", "zz"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid hex input"));
}

#[test]
fn test_xfl_encode_one() {
    hook_engine()
        .args(["xfl", "encode", "1", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("6089866696204910592"))
        .stdout(predicate::str::contains("Exponent: -15"));
}

#[test]
fn test_xfl_encode_negative() {
    hook_engine()
        .args(["xfl", "encode", "-25", "-1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mantissa: 2500000000000000"))
        .stdout(predicate::str::contains("Sign:     -"));
}

#[test]
fn test_xfl_decode_hex_and_decimal_agree() {
    let decimal = hook_engine()
        .args(["xfl", "decode", "6089866696204910592"])
        .output()
        .unwrap();
    let hex = hook_engine()
        .args(["xfl", "decode", "0x54838D7EA4C68000"])
        .output()
        .unwrap();
    assert!(decimal.status.success());
    assert_eq!(decimal.stdout, hex.stdout);
}

#[test]
fn test_xfl_decode_rejects_invalid() {
    hook_engine()
        .args(["xfl", "decode", "5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a valid XFL"));
}
