//! LTE connect shield modem library.
//!
//! ```text
//!   UART ISR ──▶ serial (ring buffers, RTS/CTS) ──▶ stream::ByteStream
//!                                                       │
//!                          at (command engine, URC fan-out)
//!                                                       │
//!                          modem (power, SIM, registration)
//! ```
//!
//! Everything below `adapters` is `no_std`; the `std` feature (on by
//! default) adds the host adapters, the simulated UART and the in-memory
//! stream used by the tests.

#![cfg_attr(not(any(test, feature = "std")), no_std)]
#![deny(unused_must_use)]

pub mod at;
pub mod config;
pub mod error;
pub mod modem;
pub mod serial;
pub mod stream;

#[cfg(feature = "std")]
pub mod adapters;

pub use at::{AtCommandEngine, AtEvent, EngineState, ListenerRegistry, UrcListener};
pub use config::ModemConfig;
pub use error::{AtError, Error, ModemError, Result, SerialError};
pub use modem::{ModemController, RegState, RegistrationWatcher, SimPinState};
pub use serial::{RingBuffer, SerialIrq, SerialPort, SerialShared};
pub use stream::ByteStream;
