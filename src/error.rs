//! Unified error types for the modem stack.
//!
//! A single `Error` enum that every layer can convert into, with one
//! `Copy` sub-enum per layer so errors pass through the engine and the
//! controller without allocation.  Nothing here is fatal: every failure
//! is returned to the caller as a status value.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The AT protocol engine rejected or failed an exchange.
    At(AtError),
    /// The serial transport could not be brought up.
    Serial(SerialError),
    /// A modem-level operation failed.
    Modem(ModemError),
    /// Configuration is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(e) => write!(f, "at: {e}"),
            Self::Serial(e) => write!(f, "serial: {e}"),
            Self::Modem(e) => write!(f, "modem: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// AT engine errors
// ---------------------------------------------------------------------------

/// Synchronous rejections from [`AtCommandEngine`](crate::at::AtCommandEngine).
///
/// Protocol timeouts are not errors: they surface as `Ok(false)` or a
/// short byte count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtError {
    /// A command is already outstanding.
    Busy,
    /// No command is outstanding, so there is no response to read.
    NoCommandPending,
    /// Command text plus terminator does not fit the command buffer.
    CommandTooLong,
    /// The underlying stream failed to accept the command bytes.
    WriteFailed,
}

impl fmt::Display for AtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "command already outstanding"),
            Self::NoCommandPending => write!(f, "no command outstanding"),
            Self::CommandTooLong => write!(f, "command exceeds buffer"),
            Self::WriteFailed => write!(f, "stream write failed"),
        }
    }
}

impl From<AtError> for Error {
    fn from(e: AtError) -> Self {
        Self::At(e)
    }
}

// ---------------------------------------------------------------------------
// Serial transport errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialError {
    /// The port storage has already been split into handles.
    AlreadySplit,
    /// Baud rate of zero requested.
    InvalidBaud,
}

impl fmt::Display for SerialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadySplit => write!(f, "port already split"),
            Self::InvalidBaud => write!(f, "invalid baud rate"),
        }
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Self::Serial(e)
    }
}

// ---------------------------------------------------------------------------
// Modem controller errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModemError {
    /// An AT exchange was rejected by the engine.
    At(AtError),
    /// The expected response marker never arrived.
    NoResponse(&'static str),
    /// The modem answered `ERROR`.
    Rejected,
    /// The response did not contain the expected field.
    Malformed,
    /// An argument failed validation before anything was sent.
    InvalidArgument(&'static str),
    /// SIM is not unlocked.
    SimNotReady,
    /// Registration did not complete within the poll budget.
    NotRegistered,
    /// Driving the power key failed.
    PowerPin,
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::At(e) => write!(f, "{e}"),
            Self::NoResponse(marker) => write!(f, "no {marker} received"),
            Self::Rejected => write!(f, "modem answered ERROR"),
            Self::Malformed => write!(f, "malformed response"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::SimNotReady => write!(f, "SIM PIN not ready"),
            Self::NotRegistered => write!(f, "network registration timed out"),
            Self::PowerPin => write!(f, "power key GPIO write failed"),
        }
    }
}

impl From<AtError> for ModemError {
    fn from(e: AtError) -> Self {
        Self::At(e)
    }
}

impl From<ModemError> for Error {
    fn from(e: ModemError) -> Self {
        match e {
            ModemError::At(inner) => Self::At(inner),
            other => Self::Modem(other),
        }
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, Error>;
