//! Modem stack configuration.
//!
//! Buffer capacities are compile-time constants because every buffer in
//! the stack is fixed-size.  Timing parameters live in [`ModemConfig`] so
//! a board can tune them without touching the engine.

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Command buffer capacity in bytes, including the trailing CR: the
/// longest accepted command text is 74 characters.
pub const AT_COMMAND_BUFFER_SIZE: usize = 75;

/// Longest URC line the engine will dispatch, terminator excluded.
pub const AT_URC_BUFFER_SIZE: usize = 75;

/// Number of URC listener slots.
pub const MAX_URC_LISTENERS: usize = 6;

/// Default serial receive ring size.
pub const SERIAL_RX_BUFFER_SIZE: usize = 64;

/// Default serial transmit ring size.
pub const SERIAL_TX_BUFFER_SIZE: usize = 64;

/// Final result code confirming a command.
pub const RESPONSE_OK: &str = "OK";

/// Final result code rejecting a command.
pub const RESPONSE_ERROR: &str = "ERROR";

/// URC the module emits while its firmware boots.
pub const SYSLOADING_MARKER: &str = "^SYSLOADING";

/// URC the module emits once it accepts AT commands.
pub const SYSSTART_MARKER: &str = "^SYSSTART";

/// Tunable timing for the AT engine and the modem controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModemConfig {
    // --- Serial ---
    /// UART baud rate.
    pub baud_rate: u32,

    // --- AT engine ---
    /// Settling delay after a command is written (ms).
    pub command_delay_ms: u32,
    /// Inter-byte response timeout (ms).
    pub response_timeout_ms: u32,

    // --- Power key ---
    /// Power key held low to switch on (ms).
    pub power_on_low_ms: u32,
    /// Power key released high after switch-on (ms).
    pub power_on_release_ms: u32,
    /// Power key held low to switch off (ms).
    pub power_off_low_ms: u32,
    /// Power key released high after switch-off (ms).
    pub power_off_release_ms: u32,

    // --- Network registration ---
    /// `AT+CREG?` polls before giving up.
    pub registration_polls: u8,
    /// Pause between registration polls (ms).
    pub registration_poll_interval_ms: u32,
    /// Response reads while waiting for `AT+COPS` to be acknowledged.
    pub operator_ack_polls: u8,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            // Serial
            baud_rate: 115_200,

            // AT engine
            command_delay_ms: 200,
            response_timeout_ms: 4000,

            // Power key
            power_on_low_ms: 1000,
            power_on_release_ms: 500,
            power_off_low_ms: 3500,
            power_off_release_ms: 500,

            // Registration
            registration_polls: 30,
            registration_poll_interval_ms: 1000,
            operator_ack_polls: 50,
        }
    }
}

impl ModemConfig {
    /// Reject values that would wedge the stack.
    pub fn validate(&self) -> Result<(), Error> {
        if self.baud_rate == 0 {
            return Err(Error::Config("baud_rate must be non-zero"));
        }
        if self.response_timeout_ms == 0 {
            return Err(Error::Config("response_timeout_ms must be non-zero"));
        }
        if self.registration_polls == 0 || self.operator_ack_polls == 0 {
            return Err(Error::Config("poll budgets must be non-zero"));
        }
        Ok(())
    }
}
