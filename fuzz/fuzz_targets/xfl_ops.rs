#![no_main]

use hook_engine::xfl;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: (i64, i64, u32)| {
    let (a, b, n) = input;
    let results = [
        xfl::sum(a, b),
        xfl::multiply(a, b),
        xfl::divide(a, b),
        xfl::mulratio(a, n & 1 == 1, n, n.rotate_left(7)),
        xfl::root(a, n),
        xfl::log(a),
        xfl::invert(a),
    ];
    for value in results.into_iter().flatten() {
        assert!(xfl::check(value).is_ok(), "operation produced malformed xfl {value}");
    }
});
