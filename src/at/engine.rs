//! AT command / response engine.
//!
//! ```text
//!            send_command ──▶ ┌───────────────────┐
//!   ┌──────┐                  │ AwaitingResponse  │
//!   │ Idle │ ◀── read_response / read_response_and_verify
//!   └──────┘                  └───────────────────┘
//! ```
//!
//! At most one command is outstanding.  Before a command goes out the
//! receive side is cleaned: stale bytes are thrown away until URC
//! processing has been switched on (by the first [`process_urc`] call),
//! after which buffered lines are drained and dispatched instead.
//!
//! [`process_urc`]: AtCommandEngine::process_urc

use core::fmt::{self, Write as _};

use embedded_hal::delay::DelayNs;
use heapless::String;
use log::{debug, trace, warn};

use super::urc::{ListenerRegistry, UrcListener, classify};
use crate::config::{AT_COMMAND_BUFFER_SIZE, AT_URC_BUFFER_SIZE, MAX_URC_LISTENERS, ModemConfig};
use crate::error::AtError;
use crate::stream::ByteStream;

/// Command terminator.
const CR: u8 = b'\r';
/// Response and URC line terminator.
const LF: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    AwaitingResponse,
}

/// Protocol engine over any [`ByteStream`].
///
/// `'l` bounds the registered listeners: each must outlive the engine's
/// use of it, which the borrow checker enforces at registration.
pub struct AtCommandEngine<'l, S, D, const K: usize = MAX_URC_LISTENERS> {
    stream: S,
    delay: D,
    state: EngineState,
    urc_enabled: bool,
    listeners: ListenerRegistry<'l, K>,
    command: String<AT_COMMAND_BUFFER_SIZE>,
    default_delay_ms: u32,
}

impl<'l, S, D, const K: usize> AtCommandEngine<'l, S, D, K>
where
    S: ByteStream,
    D: DelayNs,
{
    /// Take ownership of the stream and apply the configured response
    /// timeout to it.
    pub fn new(mut stream: S, delay: D, config: &ModemConfig) -> Self {
        stream.set_timeout(config.response_timeout_ms);
        Self {
            stream,
            delay,
            state: EngineState::Idle,
            urc_enabled: false,
            listeners: ListenerRegistry::new(),
            command: String::new(),
            default_delay_ms: config.command_delay_ms,
        }
    }

    // ── Commands ──────────────────────────────────────────────

    /// Send `text` + CR and wait `delay_ms` for the modem to settle.
    pub fn send_command(&mut self, text: &str, delay_ms: u32) -> Result<(), AtError> {
        self.stage(format_args!("{text}"))?;
        self.transmit(delay_ms)
    }

    /// [`send_command`](Self::send_command) with the configured delay.
    pub fn send(&mut self, text: &str) -> Result<(), AtError> {
        self.send_command(text, self.default_delay_ms)
    }

    /// Format a command in place (no intermediate buffer) and send it
    /// with the configured delay.
    pub fn send_fmt(&mut self, args: fmt::Arguments<'_>) -> Result<(), AtError> {
        self.stage(args)?;
        self.transmit(self.default_delay_ms)
    }

    fn stage(&mut self, args: fmt::Arguments<'_>) -> Result<(), AtError> {
        if self.state != EngineState::Idle {
            return Err(AtError::Busy);
        }
        self.command.clear();
        let staged = self.command.write_fmt(args).is_ok() && self.command.push(CR as char).is_ok();
        if !staged {
            self.command.clear();
            return Err(AtError::CommandTooLong);
        }
        Ok(())
    }

    fn transmit(&mut self, delay_ms: u32) -> Result<(), AtError> {
        self.clear_stale_input();

        if self.stream.write(self.command.as_bytes()).is_err() {
            warn!("at: write failed for {:?}", self.command.trim_end());
            return Err(AtError::WriteFailed);
        }
        self.state = EngineState::AwaitingResponse;
        debug!("at: >> {}", self.command.trim_end());

        self.delay.delay_ms(delay_ms);
        Ok(())
    }

    fn clear_stale_input(&mut self) {
        if self.urc_enabled {
            self.process_urc();
        } else {
            let mut dropped = 0usize;
            while self.stream.read().is_some() {
                dropped += 1;
            }
            if dropped > 0 {
                trace!("at: discarded {} stale byte(s)", dropped);
            }
        }
    }

    // ── Responses ─────────────────────────────────────────────

    /// Read up to `buf.len()` response bytes, each bounded by the
    /// response timeout.  Returns to `Idle` whatever the outcome.
    pub fn read_response(&mut self, buf: &mut [u8]) -> Result<usize, AtError> {
        if self.state != EngineState::AwaitingResponse {
            return Err(AtError::NoCommandPending);
        }
        let n = self.stream.read_bytes(buf);
        self.state = EngineState::Idle;
        trace!("at: << {} byte(s)", n);
        Ok(n)
    }

    /// Scan the response for `expected`.  Consumes input up to and
    /// including the match, or until the timeout on failure.  Returns to
    /// `Idle` whatever the outcome.
    pub fn read_response_and_verify(&mut self, expected: &str) -> Result<bool, AtError> {
        if self.state != EngineState::AwaitingResponse {
            return Err(AtError::NoCommandPending);
        }
        let found = self.stream.find(expected.as_bytes());
        self.state = EngineState::Idle;
        if found {
            trace!("at: << {}", expected);
        } else {
            debug!("at: {:?} not received", expected);
        }
        Ok(found)
    }

    /// Wait for `marker` without sending anything.
    ///
    /// For banners the modem emits on its own (boot markers): the wait is
    /// treated as the response of a command that was never written.
    pub fn expect_unsolicited(&mut self, marker: &str) -> Result<bool, AtError> {
        if self.state != EngineState::Idle {
            return Err(AtError::Busy);
        }
        self.state = EngineState::AwaitingResponse;
        self.read_response_and_verify(marker)
    }

    // ── URCs ──────────────────────────────────────────────────

    /// Dispatch every complete buffered line that classifies as a URC;
    /// discard the rest.  Switches URC processing on for good.
    pub fn process_urc(&mut self) {
        self.urc_enabled = true;

        let mut line = [0u8; AT_URC_BUFFER_SIZE];
        while self.stream.available() > 0 {
            let n = self.stream.read_bytes_until(LF, &mut line);
            if n == line.len() && !self.skip_rest_of_line() {
                warn!("at: dropped over-long line ({}+ bytes)", n);
                continue;
            }
            match classify(&line[..n]) {
                Some(event) => {
                    debug!("at: urc {}", event);
                    self.listeners.dispatch(&event);
                }
                None if n > 0 => trace!("at: ignored line of {} byte(s)", n),
                None => {}
            }
        }
    }

    /// Called after a full line buffer.  Consumes through the next LF and
    /// returns `true` when the line was in fact complete: nothing but its
    /// terminator (LF or CRLF) was left over.
    fn skip_rest_of_line(&mut self) -> bool {
        let mut overflow = 0usize;
        let mut last = 0u8;
        while let Some(b) = self.stream.timed_read() {
            if b == LF {
                return overflow == 0 || (overflow == 1 && last == CR);
            }
            overflow += 1;
            last = b;
        }
        false
    }

    pub fn urc_processing_enabled(&self) -> bool {
        self.urc_enabled
    }

    /// Returns `false` and changes nothing when every slot is taken.
    pub fn register_listener(&mut self, listener: &'l dyn UrcListener) -> bool {
        let added = self.listeners.register(listener);
        if !added {
            warn!("at: listener registry full ({} slots)", K);
        }
        added
    }

    pub fn unregister_listener(&mut self, listener: &dyn UrcListener) -> bool {
        self.listeners.unregister(listener)
    }

    pub fn listeners(&self) -> &ListenerRegistry<'l, K> {
        &self.listeners
    }

    // ── Raw passthrough ───────────────────────────────────────

    /// Write payload bytes outside the command protocol.
    pub fn write_data(&mut self, data: &[u8]) -> Result<usize, AtError> {
        self.stream.write(data).map_err(|_| AtError::WriteFailed)
    }

    pub fn data_available(&self) -> usize {
        self.stream.available()
    }

    /// Read payload bytes, bounded by the response timeout.
    pub fn read_data(&mut self, buf: &mut [u8]) -> usize {
        self.stream.read_bytes(buf)
    }

    pub fn read_byte(&mut self) -> Option<u8> {
        self.stream.read()
    }

    pub fn flush(&mut self) -> Result<(), AtError> {
        self.stream.flush().map_err(|_| AtError::WriteFailed)
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn set_timeout(&mut self, timeout_ms: u32) {
        self.stream.set_timeout(timeout_ms);
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Treat the next read as a further piece of the last command's
    /// response (for commands that answer in several chunks).
    pub(crate) fn rearm(&mut self) {
        self.state = EngineState::AwaitingResponse;
    }

    /// Busy-wait on the engine's delay provider.
    pub(crate) fn pause_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }

    pub fn into_parts(self) -> (S, D) {
        (self.stream, self.delay)
    }
}
