//! Modem status values and their response parsers.

use core::fmt;

/// Network registration status (`<stat>` of `+CREG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RegState {
    /// Not registered and not searching.
    NotRegistered = 0,
    /// Registered on the home network.
    Registered = 1,
    /// Not registered, searching.
    Searching = 2,
    Denied = 3,
    Unknown = 4,
    /// Registered on a visited network.
    Roaming = 5,
}

impl RegState {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotRegistered),
            1 => Some(Self::Registered),
            2 => Some(Self::Searching),
            3 => Some(Self::Denied),
            4 => Some(Self::Unknown),
            5 => Some(Self::Roaming),
            _ => None,
        }
    }

    /// Home or roaming: data and SMS are available either way.
    pub fn is_registered(self) -> bool {
        matches!(self, Self::Registered | Self::Roaming)
    }
}

impl fmt::Display for RegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotRegistered => "not registered",
            Self::Registered => "registered",
            Self::Searching => "searching",
            Self::Denied => "denied",
            Self::Unknown => "unknown",
            Self::Roaming => "roaming",
        };
        f.write_str(s)
    }
}

const CREG_MARKER: &str = "+CREG:";

/// Parse the `AT+CREG?` response, `+CREG: <n>,<stat>[,...]`.
///
/// Takes the field after the `+CREG:` marker structurally: `<stat>` is
/// the second field, or the only one if the modem omits `<n>`.
pub fn parse_creg_query(response: &str) -> Option<RegState> {
    let params = after_marker(response, CREG_MARKER)?;
    let mut fields = params.split(',').map(str::trim);
    let first = fields.next()?;
    let stat = fields.next().unwrap_or(first);
    parse_code(stat)
}

/// Parse the parameters of a `+CREG` URC, `<stat>[,<lac>,<ci>]`.
pub fn parse_creg_urc(params: &str) -> Option<RegState> {
    parse_code(params.split(',').next()?.trim())
}

fn after_marker<'a>(response: &'a str, marker: &str) -> Option<&'a str> {
    let start = response.find(marker)? + marker.len();
    let rest = &response[start..];
    Some(rest.split(['\r', '\n']).next().unwrap_or(rest))
}

fn parse_code(field: &str) -> Option<RegState> {
    field.parse::<u8>().ok().and_then(RegState::from_code)
}

// ── SIM ───────────────────────────────────────────────────────

/// SIM lock status from `AT+CPIN?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimPinState {
    Ready,
    PinRequired,
    Pin2Required,
    PukRequired,
    Puk2Required,
}

impl SimPinState {
    /// Match the response text.  The two-suffixed codes contain the plain
    /// ones as substrings, so they are checked first.
    pub fn parse(response: &str) -> Option<Self> {
        const TABLE: [(&str, SimPinState); 5] = [
            ("READY", SimPinState::Ready),
            ("PUK2", SimPinState::Puk2Required),
            ("PIN2", SimPinState::Pin2Required),
            ("PUK", SimPinState::PukRequired),
            ("PIN", SimPinState::PinRequired),
        ];
        let body = after_marker(response, "+CPIN:").unwrap_or(response);
        TABLE
            .iter()
            .find(|(marker, _)| body.contains(marker))
            .map(|&(_, state)| state)
    }
}

impl fmt::Display for SimPinState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ready => "READY",
            Self::PinRequired => "SIM PIN",
            Self::Pin2Required => "SIM PIN2",
            Self::PukRequired => "SIM PUK",
            Self::Puk2Required => "SIM PUK2",
        };
        f.write_str(s)
    }
}
