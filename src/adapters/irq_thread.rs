//! Interrupt emulation on a hosted target.
//!
//! Runs the [`SerialIrq`] side of a port on its own thread, standing in
//! for the receive-complete and data-register-empty interrupts:
//!
//! ```text
//!   source (io::Read) ──byte──▶ on_byte_received ──▶ rx ring ──▶ SerialPort
//!                      (only while RTS is asserted)
//!   SimUart wire ◀── on_transmit_ready ◀── tx ring ◀──────────── SerialPort
//! ```
//!
//! The peer is modelled as honouring flow control: no byte is taken from
//! the source while RTS is deasserted, so a slow foreground throttles the
//! source instead of overrunning the ring.

use std::io::{ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{Scope, ScopedJoinHandle};

use embedded_hal::digital::{InputPin, OutputPin};
use log::{debug, warn};

use crate::serial::{SerialIrq, UartHw};

/// Counters returned when the pump stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PumpStats {
    /// Bytes delivered to the receive interrupt.
    pub received: usize,
    /// Transmit-ready interrupts serviced.
    pub transmit_events: usize,
    /// Source reached end of input.
    pub source_closed: bool,
}

/// Pump until `stop` is set.
///
/// `WouldBlock` from the source means "nothing yet" and the loop keeps
/// polling.  End of input stops the receive side only; the transmit side
/// keeps running until `stop`.  A blocking source delays the stop until
/// its next byte.
pub fn run_irq_pump<R, U, RTS, CTS, const RX: usize, const TX: usize>(
    mut source: R,
    mut irq: SerialIrq<'_, U, RTS, CTS, RX, TX>,
    stop: &AtomicBool,
) -> PumpStats
where
    R: Read,
    U: UartHw,
    RTS: OutputPin,
    CTS: InputPin,
{
    let mut stats = PumpStats::default();
    let mut byte = [0u8; 1];

    while !stop.load(Ordering::Acquire) {
        let mut idle = true;

        if irq.transmit_pending() {
            irq.on_transmit_ready();
            stats.transmit_events += 1;
            idle = false;
        }

        if !stats.source_closed && irq.rts_asserted() {
            match source.read(&mut byte) {
                Ok(0) => {
                    debug!("irq pump: source closed after {} byte(s)", stats.received);
                    stats.source_closed = true;
                }
                Ok(_) => {
                    irq.on_byte_received(byte[0]);
                    stats.received += 1;
                    idle = false;
                }
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {}
                Err(e) => {
                    warn!("irq pump: source failed: {}", e);
                    stats.source_closed = true;
                }
            }
        }

        if idle {
            std::thread::yield_now();
        }
    }
    stats
}

/// [`run_irq_pump`] on a scoped thread.
pub fn spawn_irq_pump<'scope, 'env, R, U, RTS, CTS, const RX: usize, const TX: usize>(
    scope: &'scope Scope<'scope, 'env>,
    source: R,
    irq: SerialIrq<'env, U, RTS, CTS, RX, TX>,
    stop: &'env AtomicBool,
) -> ScopedJoinHandle<'scope, PumpStats>
where
    R: Read + Send + 'scope,
    U: UartHw + Sync,
    RTS: OutputPin + Send,
    CTS: InputPin + Send,
{
    scope.spawn(move || run_irq_pump(source, irq, stop))
}
