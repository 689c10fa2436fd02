//! Interrupt-driven serial transport.
//!
//! - [`ring_buffer`]: lock-free SPSC byte ring, one per direction
//! - [`port`]: flow-controlled UART split into interrupt and foreground
//!   handles
//! - [`hw`]: register, clock and pin seams
//! - `sim`: host register model (feature `std`, and unit tests)

pub mod hw;
pub mod port;
pub mod ring_buffer;
#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use hw::{Clock, NoPin, UartHw};
pub use port::{SerialIrq, SerialPort, SerialShared};
pub use ring_buffer::{Consumer, Producer, RingBuffer};
