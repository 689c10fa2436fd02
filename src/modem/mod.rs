//! Modem controller: power sequencing and feature commands on top of
//! the AT engine.
//!
//! ```text
//!   begin()
//!     ├─ turn_on()            power key low 1000 ms, high 500 ms
//!     ├─ ^SYSLOADING          banner, waited for as a response
//!     ├─ ^SYSSTART            banner, module accepts commands
//!     ├─ ATE0                 echo off
//!     └─ AT\Q2                RTS/CTS on (only with flow control)
//! ```
//!
//! A missing boot banner switches the module off again.

pub mod types;

use core::cell::Cell;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::String;
use log::{debug, info, warn};

use crate::at::{AtCommandEngine, AtEvent, UrcListener};
use crate::config::{
    AT_COMMAND_BUFFER_SIZE, MAX_URC_LISTENERS, ModemConfig, RESPONSE_ERROR, RESPONSE_OK,
    SYSLOADING_MARKER, SYSSTART_MARKER,
};
use crate::error::{AtError, Error, ModemError};
use crate::stream::ByteStream;

pub use types::{RegState, SimPinState, parse_creg_query, parse_creg_urc};

/// Response chunk read per `AT+COPS` acknowledgement poll.
const OPERATOR_ACK_CHUNK: usize = 25;
/// `ATI` response buffer.
const IDENT_BUFFER_SIZE: usize = 128;
/// Marker separating the product name from the revision in `ATI`.
const REVISION_MARKER: &str = "REVISION";
/// Longest accepted SIM PIN.
const MAX_SIM_PIN_LEN: usize = 4;

/// Identification strings returned by [`ModemController::name`] and
/// [`ModemController::version`].
pub type IdentString = String<64>;

pub struct ModemController<'l, S, D, P, const K: usize = MAX_URC_LISTENERS> {
    engine: AtCommandEngine<'l, S, D, K>,
    power_key: P,
    config: ModemConfig,
    hardware_flow_control: bool,
}

impl<'l, S, D, P, const K: usize> ModemController<'l, S, D, P, K>
where
    S: ByteStream,
    D: DelayNs,
    P: OutputPin,
{
    pub fn new(stream: S, delay: D, power_key: P, config: ModemConfig) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            engine: AtCommandEngine::new(stream, delay, &config),
            power_key,
            config,
            hardware_flow_control: false,
        })
    }

    /// Enable RTS/CTS on the modem side during [`begin`](Self::begin).
    /// Set when the serial port has both flow-control lines wired.
    #[must_use]
    pub fn with_hardware_flow_control(mut self, enabled: bool) -> Self {
        self.hardware_flow_control = enabled;
        self
    }

    // ── Power ─────────────────────────────────────────────────

    /// Power up, wait for the boot banners and apply the base settings.
    pub fn begin(&mut self) -> Result<(), ModemError> {
        self.engine.set_timeout(self.config.response_timeout_ms);
        self.turn_on()?;

        for marker in [SYSLOADING_MARKER, SYSSTART_MARKER] {
            if !self.engine.expect_unsolicited(marker)? {
                warn!("modem: no {} banner, powering off", marker);
                self.turn_off()?;
                return Err(ModemError::NoResponse(marker));
            }
            debug!("modem: {}", marker);
        }
        info!("modem: started");

        self.send_command_with_conf("ATE0")?;
        if self.hardware_flow_control {
            self.send_command_with_conf("AT\\Q2")?;
        }
        Ok(())
    }

    pub fn turn_on(&mut self) -> Result<(), ModemError> {
        info!("modem: power on");
        let (low, high) = (self.config.power_on_low_ms, self.config.power_on_release_ms);
        self.pulse_power_key(low, high)
    }

    pub fn turn_off(&mut self) -> Result<(), ModemError> {
        info!("modem: power off");
        let (low, high) = (self.config.power_off_low_ms, self.config.power_off_release_ms);
        self.pulse_power_key(low, high)
    }

    fn pulse_power_key(&mut self, low_ms: u32, high_ms: u32) -> Result<(), ModemError> {
        self.power_key.set_low().map_err(|_| ModemError::PowerPin)?;
        self.engine.pause_ms(low_ms);
        self.power_key.set_high().map_err(|_| ModemError::PowerPin)?;
        self.engine.pause_ms(high_ms);
        Ok(())
    }

    // ── Command helpers ───────────────────────────────────────

    /// Send `cmd` and require `OK`.
    pub fn send_command_with_conf(&mut self, cmd: &str) -> Result<(), ModemError> {
        if self.send_command_verify(RESPONSE_OK, cmd)? {
            Ok(())
        } else {
            Err(ModemError::NoResponse(RESPONSE_OK))
        }
    }

    /// Send `cmd` and scan the response for `expected`.
    pub fn send_command_verify(&mut self, expected: &str, cmd: &str) -> Result<bool, AtError> {
        self.engine.send(cmd)?;
        self.engine.read_response_and_verify(expected)
    }

    /// Send `cmd` and collect its response into `buf`.
    fn query<'b>(&mut self, cmd: &str, buf: &'b mut [u8]) -> Result<&'b str, ModemError> {
        self.engine.send(cmd)?;
        let n = self.engine.read_response(buf)?;
        core::str::from_utf8(&buf[..n]).map_err(|_| ModemError::Malformed)
    }

    // ── Identification ────────────────────────────────────────

    /// Product name: the `ATI` response before `REVISION`.
    pub fn name(&mut self) -> Result<IdentString, ModemError> {
        let mut buf = [0u8; IDENT_BUFFER_SIZE];
        let text = self.query("ATI", &mut buf)?;
        let end = text.find(REVISION_MARKER).ok_or(ModemError::Malformed)?;
        IdentString::try_from(text[..end].trim()).map_err(|()| ModemError::Malformed)
    }

    /// Firmware revision: the `ATI` line starting at `REVISION`.
    pub fn version(&mut self) -> Result<IdentString, ModemError> {
        let mut buf = [0u8; IDENT_BUFFER_SIZE];
        let text = self.query("ATI", &mut buf)?;
        let start = text.find(REVISION_MARKER).ok_or(ModemError::Malformed)?;
        let line = text[start..].split(['\r', '\n']).next().unwrap_or_default();
        IdentString::try_from(line.trim_end()).map_err(|()| ModemError::Malformed)
    }

    pub fn lib_version(&self) -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    // ── Network ───────────────────────────────────────────────

    pub fn registration_state(&mut self) -> Result<RegState, ModemError> {
        let mut buf = [0u8; AT_COMMAND_BUFFER_SIZE];
        let text = self.query("AT+CREG?", &mut buf)?;
        parse_creg_query(text).ok_or(ModemError::Malformed)
    }

    pub fn sim_pin_state(&mut self) -> Result<SimPinState, ModemError> {
        let mut buf = [0u8; AT_COMMAND_BUFFER_SIZE];
        let text = self.query("AT+CPIN?", &mut buf)?;
        SimPinState::parse(text).ok_or(ModemError::Malformed)
    }

    /// Unlock the SIM with a PIN of up to four digits.
    pub fn set_sim_pin(&mut self, pin: &str) -> Result<(), ModemError> {
        if pin.is_empty() || pin.len() > MAX_SIM_PIN_LEN || !pin.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ModemError::InvalidArgument("SIM PIN must be 1-4 digits"));
        }
        self.engine.send_fmt(format_args!("AT+CPIN=\"{pin}\""))?;
        if self.engine.read_response_and_verify(RESPONSE_OK)? {
            Ok(())
        } else {
            Err(ModemError::NoResponse(RESPONSE_OK))
        }
    }

    /// Select an operator and wait for registration.
    ///
    /// `None` selects automatically (`AT+COPS=0`); `Some("26201")` forces
    /// the numeric MCC/MNC (5 or 6 digits).  Gives up after the
    /// configured number of `AT+CREG?` polls.
    pub fn register_to_network(&mut self, mcc_mnc: Option<&str>) -> Result<(), ModemError> {
        if let Some(code) = mcc_mnc {
            if !matches!(code.len(), 5 | 6) || !code.bytes().all(|b| b.is_ascii_digit()) {
                return Err(ModemError::InvalidArgument("MCC/MNC must be 5 or 6 digits"));
            }
        }

        let sim = self.sim_pin_state()?;
        if sim != SimPinState::Ready {
            debug!("modem: SIM is {}, not registering", sim);
            return Err(ModemError::SimNotReady);
        }

        match mcc_mnc {
            None => self.engine.send("AT+COPS=0")?,
            Some(code) => self.engine.send_fmt(format_args!("AT+COPS=1,2,\"{code}\""))?,
        }
        self.await_operator_ack()?;

        for attempt in 1..=self.config.registration_polls {
            match self.registration_state() {
                Ok(state) if state.is_registered() => {
                    info!("modem: {} after {} poll(s)", state, attempt);
                    return Ok(());
                }
                Ok(state) => debug!("modem: registration {}", state),
                Err(e) => debug!("modem: registration poll failed: {}", e),
            }
            if attempt < self.config.registration_polls {
                self.engine.pause_ms(self.config.registration_poll_interval_ms);
            }
        }
        warn!("modem: not registered after {} polls", self.config.registration_polls);
        Err(ModemError::NotRegistered)
    }

    /// Read the `AT+COPS` response in chunks until `OK` or `ERROR`.
    ///
    /// Operator selection can take far longer than one response timeout.
    /// The tail of each chunk is carried over so a code split across two
    /// reads is still seen.  On exhaustion a bare CR aborts the command.
    fn await_operator_ack(&mut self) -> Result<(), ModemError> {
        const CARRY: usize = RESPONSE_ERROR.len() - 1;
        let mut window = [0u8; CARRY + OPERATOR_ACK_CHUNK];
        let mut kept = 0;

        for _ in 0..self.config.operator_ack_polls {
            self.engine.rearm();
            let n = self
                .engine
                .read_response(&mut window[kept..kept + OPERATOR_ACK_CHUNK])?;
            let seen = &window[..kept + n];

            if contains(seen, RESPONSE_OK.as_bytes()) {
                return Ok(());
            }
            if contains(seen, RESPONSE_ERROR.as_bytes()) {
                warn!("modem: operator selection rejected");
                return Err(ModemError::Rejected);
            }

            let total = kept + n;
            let keep = total.min(CARRY);
            window.copy_within(total - keep..total, 0);
            kept = keep;
        }

        warn!("modem: operator selection not acknowledged, aborting");
        self.engine.write_data(b"\r")?;
        Err(ModemError::NoResponse(RESPONSE_OK))
    }

    // ── URCs ──────────────────────────────────────────────────

    pub fn process_urc(&mut self) {
        self.engine.process_urc();
    }

    pub fn register_listener(&mut self, listener: &'l dyn UrcListener) -> bool {
        self.engine.register_listener(listener)
    }

    pub fn unregister_listener(&mut self, listener: &dyn UrcListener) -> bool {
        self.engine.unregister_listener(listener)
    }

    // ── Raw data ──────────────────────────────────────────────

    pub fn send_data(&mut self, data: &[u8]) -> Result<usize, AtError> {
        self.engine.write_data(data)
    }

    pub fn data_available(&self) -> usize {
        self.engine.data_available()
    }

    pub fn get_data(&mut self, buf: &mut [u8]) -> usize {
        self.engine.read_data(buf)
    }

    pub fn read(&mut self) -> Option<u8> {
        self.engine.read_byte()
    }

    pub fn flush(&mut self) -> Result<(), AtError> {
        self.engine.flush()
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn engine(&self) -> &AtCommandEngine<'l, S, D, K> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut AtCommandEngine<'l, S, D, K> {
        &mut self.engine
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Release the engine and the power key.
    pub fn into_parts(self) -> (AtCommandEngine<'l, S, D, K>, P) {
        (self.engine, self.power_key)
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

// ── Registration watcher ──────────────────────────────────────

/// Tracks the latest registration status announced by `+CREG` URCs.
///
/// Needs `AT+CREG=1` (or `=2`) so the module reports changes on its own.
#[derive(Debug, Default)]
pub struct RegistrationWatcher {
    state: Cell<Option<RegState>>,
}

impl RegistrationWatcher {
    pub const fn new() -> Self {
        Self {
            state: Cell::new(None),
        }
    }

    /// Last reported state, `None` until the first `+CREG` URC.
    pub fn state(&self) -> Option<RegState> {
        self.state.get()
    }
}

impl UrcListener for RegistrationWatcher {
    fn on_urc(&self, event: &AtEvent<'_>) {
        if !event.is("CREG") {
            return;
        }
        match event.params().and_then(parse_creg_urc) {
            Some(state) => {
                if self.state.replace(Some(state)) != Some(state) {
                    info!("modem: registration now {}", state);
                }
            }
            None => debug!("modem: unparsed {}", event),
        }
    }
}
