#![no_main]

use hook_engine::analyzer::GuardChecker;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(report) = GuardChecker::check(data) {
        assert_eq!(report.valid, report.violations.is_empty());
    }
});
