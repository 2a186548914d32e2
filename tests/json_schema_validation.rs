#[path = "cli/common.rs"]
mod common;

use common::{guarded_hook, hook_engine, unguarded_hook, write_temp};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;

fn validate(stdout: &[u8], schema_path: &str) -> Value {
    let stdout = String::from_utf8(stdout.to_vec()).expect("Stdout is not valid UTF-8");
    let json_val: Value = serde_json::from_str(&stdout)
        .unwrap_or_else(|e| panic!("Failed to parse JSON output ({e}): {stdout}"));

    let schema_content = fs::read_to_string(schema_path).expect("Failed to read schema file");
    let schema_json: Value =
        serde_json::from_str(&schema_content).expect("Failed to parse schema JSON");
    let compiled = JSONSchema::compile(&schema_json).expect("Failed to compile schema");

    if let Err(errors) = compiled.validate(&json_val) {
        let error_msgs: Vec<String> = errors
            .map(|error| format!("Property: {}, Error: {}", error.instance_path, error))
            .collect();
        panic!("JSON Schema validation failed:\n{}", error_msgs.join("\n"));
    }
    json_val
}

#[test]
fn test_guard_report_schema_validation() {
    let file = write_temp(&guarded_hook());
    // --quiet keeps log lines off the terminal; stdout carries only JSON
    let output = hook_engine()
        .arg("--quiet")
        .arg("guard-check")
        .arg(file.path())
        .arg("--output")
        .arg("json")
        .output()
        .expect("Failed to execute command");
    assert!(
        output.status.success(),
        "Command failed: {:?}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report = validate(&output.stdout, "tests/schemas/guard_report.json");
    assert_eq!(report["valid"], Value::Bool(true));
    assert_eq!(report["worst_case_guard_budget"], 11);
}

#[test]
fn test_failing_guard_report_is_still_valid_json() {
    let file = write_temp(&unguarded_hook());
    let output = hook_engine()
        .args(["--quiet", "--output", "json", "guard-check"])
        .arg(file.path())
        .output()
        .expect("Failed to execute command");
    assert!(!output.status.success());

    let report = validate(&output.stdout, "tests/schemas/guard_report.json");
    assert_eq!(report["violations"][0]["type"], "unguarded_loop");
}

#[test]
fn test_xfl_summary_schema_validation() {
    let cases: [&[&str]; 2] = [&["encode", "-25", "-1"], &["decode", "6089866696204910592"]];
    for args in cases {
        let output = hook_engine()
            .args(["--quiet", "--output", "json", "xfl"])
            .args(args)
            .output()
            .expect("Failed to execute command");
        assert!(output.status.success());
        validate(&output.stdout, "tests/schemas/xfl_summary.json");
    }
}
