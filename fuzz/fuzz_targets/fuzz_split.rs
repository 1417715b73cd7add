// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

#![no_main]

use libfuzzer_sys::fuzz_target;
use mandeltidy::splitter::{derivative_names, split_record, FrameRecord, SplitSettings};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let (first, second) = derivative_names(text);
    assert!(first.ends_with("_0.json") && second.ends_with("_1.json"));

    let Ok(record) = FrameRecord::from_json(text) else {
        return;
    };

    let settings = SplitSettings {
        width: 900,
        height: 900,
        accepted_lengths: vec![record.nums.len().max(2)],
    };
    if let Some((a, b)) = split_record(&record, &settings) {
        assert!(a.nums.len() >= b.nums.len());
        assert_eq!(a.iterations.as_u64(), Some(a.nums.len() as u64));
        assert_eq!([a.nums, b.nums].concat(), record.nums);
    }
});
