//! Host time adapters.
//!
//! - [`SystemClock`]: [`Clock`] over `std::time::Instant`
//! - [`StdDelay`]: [`DelayNs`] over `std::thread::sleep`
//!
//! On the microcontroller the HAL's timer and delay take their place.

use std::time::{Duration, Instant};

use embedded_hal::delay::DelayNs;

use crate::serial::Clock;

/// Monotonic milliseconds since construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Blocking delay that sleeps the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdDelay;

impl DelayNs for StdDelay {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(Duration::from_nanos(u64::from(ns)));
    }

    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(Duration::from_millis(u64::from(ms)));
    }
}
