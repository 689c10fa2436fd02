//! Fuzz target: response parsers
//!
//! `parse_creg_query`, `SimPinState::parse` and `classify` must never
//! panic on arbitrary modem output, UTF-8 or not.
//!
//! cargo fuzz run fuzz_responses

#![no_main]

use libfuzzer_sys::fuzz_target;
use ltemodem::at::classify;
use ltemodem::modem::{SimPinState, parse_creg_query};

fuzz_target!(|data: &[u8]| {
    for line in data.split(|&b| b == b'\n') {
        let _ = classify(line);
    }
    if let Ok(text) = core::str::from_utf8(data) {
        let _ = parse_creg_query(text);
        let _ = SimPinState::parse(text);
    }
});
