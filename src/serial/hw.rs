//! Hardware seams for the serial transport.
//!
//! - [`UartHw`]: the UART register block (data register, status flags,
//!   interrupt enables).  Methods take `&self` because the registers are
//!   touched from both the interrupt handler and the foreground, the same
//!   way a PAC register block is.
//! - [`Clock`]: monotonic milliseconds for read timeouts.
//! - [`NoPin`]: stands in for an RTS or CTS line that is not wired.

use core::convert::Infallible;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

/// UART register access.
pub trait UartHw {
    /// Program the baud-rate generator.
    fn set_baud(&self, baud: u32);

    /// Enable receiver, transmitter and the receive interrupt; leave the
    /// transmit-ready interrupt disabled.
    fn enable(&self);

    /// Disable receiver, transmitter and both interrupts.
    fn disable(&self);

    /// Load the data register.  Clears the transmit-complete flag.
    fn write_data(&self, byte: u8);

    /// Data register can take another byte.
    fn data_register_empty(&self) -> bool;

    /// Shift register has finished sending the last byte.
    fn transmit_complete(&self) -> bool;

    fn set_tx_ready_interrupt(&self, enabled: bool);

    fn tx_ready_interrupt_enabled(&self) -> bool;

    /// Interrupts are globally masked, so the transmit-ready handler
    /// cannot run and busy-waits must poll the hardware themselves.
    fn interrupts_masked(&self) -> bool;
}

/// Monotonic millisecond clock.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Placeholder for an unconnected flow-control line.
///
/// Never instantiated; it only names the pin type when the line is
/// passed as `None`.
#[derive(Debug, Clone, Copy)]
pub enum NoPin {}

impl ErrorType for NoPin {
    type Error = Infallible;
}

impl OutputPin for NoPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        match *self {}
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        match *self {}
    }
}

impl InputPin for NoPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        match *self {}
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        match *self {}
    }
}
