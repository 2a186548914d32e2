#![no_main]

use hook_engine::sto::{ops, FieldScanner, ObjectView};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    for item in FieldScanner::new(data) {
        let Ok((at, span)) = item else { break };
        assert!(at + span.total_len <= data.len());
    }

    let valid = ops::validate(data).unwrap_or(0) == 1;
    if valid {
        assert!(ObjectView::parse(data).is_some());
    }

    if let Ok(packed) = ops::subarray(data, 0) {
        let (offset, len) = ops::unpack_location(packed);
        assert!(offset + len <= data.len());
    }

    if data.len() > 4 {
        let id = u32::from_be_bytes([data[0], data[1], data[2], data[3]]);
        let _ = ops::erase(data, id);
        let _ = ops::emplace(data, Some(&data[..4]), id);
    }
});
