//! Fuzz target: `AtCommandEngine::process_urc`
//!
//! Feeds arbitrary bytes to the engine as unsolicited input and asserts
//! that every dispatched event is a well-formed URC no longer than the
//! line buffer, and that the stream is fully drained.
//!
//! cargo fuzz run fuzz_urc_lines

#![no_main]

use embedded_hal::delay::DelayNs;
use libfuzzer_sys::fuzz_target;
use ltemodem::at::{AtCommandEngine, AtEvent, UrcListener};
use ltemodem::config::{AT_URC_BUFFER_SIZE, ModemConfig};
use ltemodem::stream::{ByteStream, MemoryStream};

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

struct Check;

impl UrcListener for Check {
    fn on_urc(&self, event: &AtEvent<'_>) {
        assert!(!event.payload.is_empty(), "URC payload must not be empty");
        assert!(event.payload.len() < AT_URC_BUFFER_SIZE, "URC exceeds line buffer");
        assert!(!event.payload.contains('\n'), "terminator leaked into payload");
    }
}

fuzz_target!(|data: &[u8]| {
    let check = Check;
    let mut stream = MemoryStream::new();
    stream.feed(data);

    let mut engine: AtCommandEngine<'_, _, _> =
        AtCommandEngine::new(stream, NoDelay, &ModemConfig::default());
    engine.register_listener(&check);
    engine.process_urc();

    assert_eq!(engine.stream().available(), 0, "input must be fully drained");
});
