//! Fuzz target: `RingBuffer` push/pop sequences
//!
//! Each input byte is an operation: even bytes push their value, odd
//! bytes pop.  Checks FIFO order against a model and the capacity
//! invariant after every step.
//!
//! cargo fuzz run fuzz_ring_buffer

#![no_main]

use std::collections::VecDeque;

use libfuzzer_sys::fuzz_target;
use ltemodem::serial::RingBuffer;

fuzz_target!(|data: &[u8]| {
    const N: usize = 32;
    let mut ring = RingBuffer::<N>::new();
    let mut model = VecDeque::new();

    for &op in data {
        if op & 1 == 0 {
            if ring.push(op) {
                model.push_back(op);
            } else {
                assert_eq!(model.len(), N - 1, "push rejected before full");
            }
        } else {
            assert_eq!(ring.pop(), model.pop_front());
        }
        assert_eq!(ring.free_space() + ring.available(), N - 1);
    }
});
