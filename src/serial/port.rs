//! Interrupt-driven UART with RTS/CTS hardware flow control.
//!
//! ```text
//!                 ┌──────────────── SerialShared ────────────────┐
//!  RX ISR ──────▶ │ rx ring ──────────────────────────▶ SerialPort::read_byte
//!  (SerialIrq)    │                                              │ (foreground)
//!  TX-ready ISR ◀─│ tx ring ◀────────────────────────── SerialPort::write_byte
//!                 │ RTS/CTS lines (critical section)             │
//!                 └──────────────────────────────────────────────┘
//! ```
//!
//! ## Flow control
//!
//! RTS is active low.  The ISR deasserts it once fewer than two receive
//! slots are free; the foreground reasserts it once occupancy drops to
//! half the ring or less.  The gap between the two thresholds keeps the
//! line from chattering around a single level.
//!
//! CTS is sampled before every transmit.  An unconnected CTS counts as
//! permanently clear.
//!
//! ## Loss model
//!
//! Only inbound bytes are ever dropped (receive overrun, parity error).
//! Drops are counted in the ISR and logged from the foreground on the
//! next read.  Outbound bytes are delayed, never dropped.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use critical_section::{CriticalSection, Mutex};
use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use super::hw::{Clock, UartHw};
use super::ring_buffer::{Consumer, Producer, RingBuffer};
use crate::config::{SERIAL_RX_BUFFER_SIZE, SERIAL_TX_BUFFER_SIZE};
use crate::error::SerialError;
use crate::stream::ByteStream;

struct FlowLines<RTS, CTS> {
    rts: Option<RTS>,
    cts: Option<CTS>,
}

/// Storage for one physical port.
///
/// Lives as long as the program (typically in a `static` or at the top of
/// `main`).  [`split`](Self::split) hands out the only interrupt handle
/// and the only foreground handle.
pub struct SerialShared<
    U,
    RTS,
    CTS,
    const RX: usize = SERIAL_RX_BUFFER_SIZE,
    const TX: usize = SERIAL_TX_BUFFER_SIZE,
> {
    hw: U,
    rx: RingBuffer<RX>,
    tx: RingBuffer<TX>,
    lines: Mutex<RefCell<FlowLines<RTS, CTS>>>,
    rts_asserted: AtomicBool,
    written: AtomicBool,
    taken: AtomicBool,
    overruns: AtomicU32,
    parity_errors: AtomicU32,
}

impl<U, RTS, CTS, const RX: usize, const TX: usize> SerialShared<U, RTS, CTS, RX, TX>
where
    U: UartHw,
    RTS: OutputPin,
    CTS: InputPin,
{
    /// `rts` / `cts` of `None` mean the line is not wired.
    pub fn new(hw: U, rts: Option<RTS>, cts: Option<CTS>) -> Self {
        Self {
            hw,
            rx: RingBuffer::new(),
            tx: RingBuffer::new(),
            lines: Mutex::new(RefCell::new(FlowLines { rts, cts })),
            rts_asserted: AtomicBool::new(false),
            written: AtomicBool::new(false),
            taken: AtomicBool::new(false),
            overruns: AtomicU32::new(0),
            parity_errors: AtomicU32::new(0),
        }
    }

    /// Configure the UART and hand out the interrupt / foreground pair.
    ///
    /// Asserts RTS straight away so the peer may start sending.  Fails if
    /// the storage was already split.
    pub fn split<C: Clock>(
        &self,
        baud: u32,
        clock: C,
    ) -> Result<(SerialIrq<'_, U, RTS, CTS, RX, TX>, SerialPort<'_, U, RTS, CTS, C, RX, TX>), SerialError>
    {
        if baud == 0 {
            return Err(SerialError::InvalidBaud);
        }
        if self.taken.swap(true, Ordering::AcqRel) {
            return Err(SerialError::AlreadySplit);
        }

        self.hw.set_baud(baud);
        self.hw.enable();
        self.written.store(false, Ordering::Release);
        critical_section::with(|cs| self.drive_rts(cs, true));
        debug!("serial: configured at {} baud", baud);

        // SAFETY: `taken` guarantees this is the only split, so the irq
        // handle is the unique rx producer and the port the unique rx
        // consumer and tx producer.  The tx consumer is reached only
        // through `transmit_next`, whose callers uphold the same rule.
        let irq = SerialIrq {
            shared: self,
            rx: unsafe { Producer::new_unchecked(&self.rx) },
        };
        let port = SerialPort {
            shared: self,
            rx: unsafe { Consumer::new_unchecked(&self.rx) },
            tx: unsafe { Producer::new_unchecked(&self.tx) },
            clock,
            timeout_ms: 1000,
            reported_overruns: 0,
        };
        Ok((irq, port))
    }

    /// Lifetime count of receive overruns.
    pub fn overruns(&self) -> u32 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Lifetime count of bytes discarded for parity errors.
    pub fn parity_errors(&self) -> u32 {
        self.parity_errors.load(Ordering::Relaxed)
    }

    pub fn rts_asserted(&self) -> bool {
        self.rts_asserted.load(Ordering::Acquire)
    }

    pub fn hw(&self) -> &U {
        &self.hw
    }

    // ── Flow-control lines ────────────────────────────────────

    fn drive_rts(&self, cs: CriticalSection<'_>, asserted: bool) {
        let mut lines = self.lines.borrow_ref_mut(cs);
        if let Some(rts) = lines.rts.as_mut() {
            // Active low.  GPIO writes on supported HALs are infallible.
            let _ = if asserted { rts.set_low() } else { rts.set_high() };
        }
        self.rts_asserted.store(asserted, Ordering::Release);
    }

    fn deassert_rts_if_full(&self) {
        critical_section::with(|cs| {
            if self.rts_asserted.load(Ordering::Acquire) && self.rx.free_space() < 2 {
                self.drive_rts(cs, false);
            }
        });
    }

    fn reassert_rts_if_drained(&self) {
        critical_section::with(|cs| {
            if !self.rts_asserted.load(Ordering::Acquire) && self.rx.available() <= RX / 2 {
                self.drive_rts(cs, true);
            }
        });
    }

    fn cts_clear(&self) -> bool {
        critical_section::with(|cs| {
            let mut lines = self.lines.borrow_ref_mut(cs);
            match lines.cts.as_mut() {
                // Active low.
                Some(cts) => cts.is_low().unwrap_or(false),
                None => true,
            }
        })
    }

    // ── Transmit path ─────────────────────────────────────────

    /// Move one byte from the tx ring to the data register.
    ///
    /// # Safety
    /// The caller must be the only tx consumer for the duration: either
    /// the interrupt handle, or the foreground while interrupts are
    /// masked.
    unsafe fn transmit_next(&self) {
        if !self.cts_clear() {
            // Leave the interrupt armed so it fires again.
            return;
        }
        // SAFETY: forwarded from the caller's contract.
        if let Some(byte) = unsafe { self.tx.dequeue() } {
            self.hw.write_data(byte);
        }
        critical_section::with(|_| {
            if self.tx.is_empty() {
                self.hw.set_tx_ready_interrupt(false);
            }
        });
    }
}

// ═══════════════════════════════════════════════════════════════
//  Interrupt side
// ═══════════════════════════════════════════════════════════════

/// Handle for the UART interrupt handlers.
///
/// Exactly one exists per port; the `&mut self` receivers make the
/// interrupt side the sole rx producer and tx consumer.
pub struct SerialIrq<'a, U, RTS, CTS, const RX: usize, const TX: usize> {
    shared: &'a SerialShared<U, RTS, CTS, RX, TX>,
    rx: Producer<'a, RX>,
}

impl<U, RTS, CTS, const RX: usize, const TX: usize> SerialIrq<'_, U, RTS, CTS, RX, TX>
where
    U: UartHw,
    RTS: OutputPin,
    CTS: InputPin,
{
    /// Receive-complete interrupt.
    pub fn on_byte_received(&mut self, byte: u8) {
        if self.rx.push(byte) {
            self.shared.deassert_rts_if_full();
        } else {
            self.shared.overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Receive-complete interrupt with a parity error flagged; the byte
    /// is discarded.
    pub fn on_parity_error(&mut self) {
        self.shared.parity_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Data-register-empty interrupt.
    pub fn on_transmit_ready(&mut self) {
        // SAFETY: this handle is the unique tx consumer.
        unsafe { self.shared.transmit_next() }
    }

    /// The transmit-ready interrupt is armed and would fire on hardware.
    pub fn transmit_pending(&self) -> bool {
        self.shared.hw.tx_ready_interrupt_enabled()
    }

    pub fn rts_asserted(&self) -> bool {
        self.shared.rts_asserted()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Foreground side
// ═══════════════════════════════════════════════════════════════

/// Foreground handle: reads, writes, flush and shutdown.
pub struct SerialPort<'a, U, RTS, CTS, C, const RX: usize, const TX: usize> {
    shared: &'a SerialShared<U, RTS, CTS, RX, TX>,
    rx: Consumer<'a, RX>,
    tx: Producer<'a, TX>,
    clock: C,
    timeout_ms: u32,
    reported_overruns: u32,
}

impl<U, RTS, CTS, C, const RX: usize, const TX: usize> SerialPort<'_, U, RTS, CTS, C, RX, TX>
where
    U: UartHw,
    RTS: OutputPin,
    CTS: InputPin,
    C: Clock,
{
    /// Bytes waiting in the receive ring.
    pub fn available(&self) -> usize {
        self.rx.available()
    }

    pub fn peek(&self) -> Option<u8> {
        self.rx.peek()
    }

    /// Pop one received byte, reasserting RTS once the ring has drained
    /// to half full.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.report_overruns();
        let byte = self.rx.pop()?;
        self.shared.reassert_rts_if_drained();
        Some(byte)
    }

    /// Free slots in the transmit ring.
    pub fn available_for_write(&self) -> usize {
        self.tx.free_space()
    }

    /// Queue one byte for transmission.
    ///
    /// Bypasses the ring when it is empty, CTS is clear and the data
    /// register is idle.  Otherwise spins while the ring is full; with
    /// interrupts masked the spin services the transmitter itself.
    pub fn write_byte(&mut self, byte: u8) {
        let hw = &self.shared.hw;
        self.shared.written.store(true, Ordering::Release);

        // The interrupt disarms itself only after its last byte is out, so
        // an armed interrupt means the ring is still being drained.
        if self.tx.is_empty()
            && !hw.tx_ready_interrupt_enabled()
            && hw.data_register_empty()
            && self.shared.cts_clear()
        {
            hw.write_data(byte);
            return;
        }

        while !self.tx.push(byte) {
            if hw.interrupts_masked() && hw.data_register_empty() {
                // SAFETY: interrupts are masked, so the interrupt handle
                // cannot consume concurrently.
                unsafe { self.shared.transmit_next() };
            } else {
                core::hint::spin_loop();
            }
        }

        critical_section::with(|_| hw.set_tx_ready_interrupt(true));
    }

    /// Block until every queued byte has left the shift register.
    pub fn flush(&mut self) {
        let hw = &self.shared.hw;
        if !self.shared.written.load(Ordering::Acquire) {
            return;
        }

        while hw.tx_ready_interrupt_enabled() || !hw.transmit_complete() {
            if hw.interrupts_masked() && hw.tx_ready_interrupt_enabled() && hw.data_register_empty() {
                // SAFETY: interrupts are masked, see `write_byte`.
                unsafe { self.shared.transmit_next() };
            } else {
                core::hint::spin_loop();
            }
        }
    }

    /// Drain output, drop RTS, switch the UART off and discard unread
    /// input.
    pub fn end(&mut self) {
        self.flush();
        critical_section::with(|cs| self.shared.drive_rts(cs, false));
        self.shared.hw.disable();
        self.rx.clear();
        debug!("serial: closed");
    }

    pub fn rts_asserted(&self) -> bool {
        self.shared.rts_asserted()
    }

    pub fn overruns(&self) -> u32 {
        self.shared.overruns()
    }

    fn report_overruns(&mut self) {
        let total = self.shared.overruns();
        if total != self.reported_overruns {
            warn!(
                "serial: rx overrun, {} byte(s) dropped",
                total.wrapping_sub(self.reported_overruns)
            );
            self.reported_overruns = total;
        }
    }
}

impl<U, RTS, CTS, C, const RX: usize, const TX: usize> ByteStream
    for SerialPort<'_, U, RTS, CTS, C, RX, TX>
where
    U: UartHw,
    RTS: OutputPin,
    CTS: InputPin,
    C: Clock,
{
    type Error = core::convert::Infallible;

    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
        for &byte in data {
            self.write_byte(byte);
        }
        Ok(data.len())
    }

    fn read(&mut self) -> Option<u8> {
        self.read_byte()
    }

    fn peek(&self) -> Option<u8> {
        SerialPort::peek(self)
    }

    fn available(&self) -> usize {
        SerialPort::available(self)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        SerialPort::flush(self);
        Ok(())
    }

    fn set_timeout(&mut self, timeout_ms: u32) {
        self.timeout_ms = timeout_ms;
    }

    fn timeout(&self) -> u32 {
        self.timeout_ms
    }

    fn timed_read(&mut self) -> Option<u8> {
        let start = self.clock.now_ms();
        loop {
            if let Some(byte) = self.read_byte() {
                return Some(byte);
            }
            if self.clock.now_ms().saturating_sub(start) >= u64::from(self.timeout_ms) {
                return None;
            }
            core::hint::spin_loop();
        }
    }
}
