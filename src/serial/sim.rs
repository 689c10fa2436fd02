//! Host-side simulation of the UART peripheral and GPIO lines.
//!
//! Lets the transport, the AT engine and the integration tests run on
//! x86_64 with no hardware.  The register model is atomic so the
//! "interrupt" side can live on another thread.
//!
//! Transmission is instantaneous: a byte written to the data register is
//! appended to the captured wire and the transmitter reports complete
//! straight away.  Tests stall the line with
//! [`SimUart::set_data_register_empty`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use super::hw::{Clock, UartHw};

// ── UART ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct SimUart {
    baud: AtomicU32,
    enabled: AtomicBool,
    dre: AtomicBool,
    txc: AtomicBool,
    tx_irq: AtomicBool,
    masked: AtomicBool,
    wire: Mutex<Vec<u8>>,
}

impl Default for SimUart {
    fn default() -> Self {
        Self::new()
    }
}

impl SimUart {
    pub fn new() -> Self {
        Self {
            baud: AtomicU32::new(0),
            enabled: AtomicBool::new(false),
            dre: AtomicBool::new(true),
            txc: AtomicBool::new(true),
            tx_irq: AtomicBool::new(false),
            masked: AtomicBool::new(false),
            wire: Mutex::new(Vec::new()),
        }
    }

    pub fn baud(&self) -> u32 {
        self.baud.load(Ordering::Acquire)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Simulate a busy (`false`) or idle (`true`) data register.
    pub fn set_data_register_empty(&self, empty: bool) {
        self.dre.store(empty, Ordering::Release);
    }

    /// Simulate `cli()` / `sei()`.
    pub fn set_interrupts_masked(&self, masked: bool) {
        self.masked.store(masked, Ordering::Release);
    }

    /// Bytes shifted out so far.
    pub fn wire(&self) -> Vec<u8> {
        self.wire.lock().map(|w| w.clone()).unwrap_or_default()
    }

    /// Take and clear the captured wire.
    pub fn take_wire(&self) -> Vec<u8> {
        self.wire
            .lock()
            .map(|mut w| core::mem::take(&mut *w))
            .unwrap_or_default()
    }
}

impl UartHw for SimUart {
    fn set_baud(&self, baud: u32) {
        self.baud.store(baud, Ordering::Release);
    }

    fn enable(&self) {
        self.enabled.store(true, Ordering::Release);
        self.tx_irq.store(false, Ordering::Release);
    }

    fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        self.tx_irq.store(false, Ordering::Release);
    }

    fn write_data(&self, byte: u8) {
        self.txc.store(false, Ordering::Release);
        if let Ok(mut w) = self.wire.lock() {
            w.push(byte);
        }
        self.txc.store(true, Ordering::Release);
    }

    fn data_register_empty(&self) -> bool {
        self.dre.load(Ordering::Acquire)
    }

    fn transmit_complete(&self) -> bool {
        self.txc.load(Ordering::Acquire)
    }

    fn set_tx_ready_interrupt(&self, enabled: bool) {
        self.tx_irq.store(enabled, Ordering::Release);
    }

    fn tx_ready_interrupt_enabled(&self) -> bool {
        self.tx_irq.load(Ordering::Acquire)
    }

    fn interrupts_masked(&self) -> bool {
        self.masked.load(Ordering::Acquire)
    }
}

// ── GPIO ──────────────────────────────────────────────────────

/// Shared-state GPIO line.  Clones observe and drive the same level, so
/// a test keeps one clone as a probe while the port owns another.
#[derive(Debug, Clone, Default)]
pub struct SimPin {
    high: Arc<AtomicBool>,
    writes: Arc<AtomicU32>,
}

impl SimPin {
    pub fn new(high: bool) -> Self {
        Self {
            high: Arc::new(AtomicBool::new(high)),
            writes: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn level_high(&self) -> bool {
        self.high.load(Ordering::Acquire)
    }

    /// Drive the line from the outside (e.g. the peer's CTS output).
    pub fn drive(&self, high: bool) {
        self.high.store(high, Ordering::Release);
    }

    /// Number of `set_low`/`set_high` calls made through any clone.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::Acquire)
    }
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.high.store(false, Ordering::Release);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.writes.fetch_add(1, Ordering::AcqRel);
        self.high.store(true, Ordering::Release);
        Ok(())
    }
}

impl InputPin for SimPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.level_high())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.level_high())
    }
}

// ── Clock ─────────────────────────────────────────────────────

/// Clock that advances by a fixed step every time it is read, so timed
/// reads on an idle line expire after a bounded number of polls.
#[derive(Debug)]
pub struct StepClock {
    now: AtomicU64,
    step: u64,
}

impl StepClock {
    pub fn new(step_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(0),
            step: step_ms,
        }
    }
}

impl Clock for StepClock {
    fn now_ms(&self) -> u64 {
        self.now.fetch_add(self.step, Ordering::AcqRel)
    }
}
