//! Unsolicited result codes: classification and listener fan-out.
//!
//! A line is a URC when, terminator excluded, it is longer than one
//! character and starts with `+` or `^`.  Listeners receive the payload
//! with the prefix stripped:
//!
//! ```text
//!   "+CREG: 0,1\n"  ──classify──▶  AtEvent { prefix: Plus, payload: "CREG: 0,1" }
//!   "^SYSSTART\n"   ──classify──▶  AtEvent { prefix: Caret, payload: "SYSSTART" }
//!   "+\n", "OK\n"   ──classify──▶  None
//! ```

use core::fmt;

use crate::config::MAX_URC_LISTENERS;

/// Leading character of a URC line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrcPrefix {
    /// `+`, standard 3GPP codes (`+CREG`, `+CMTI`, ...).
    Plus,
    /// `^`, vendor codes (`^SYSSTART`, ...).
    Caret,
}

impl UrcPrefix {
    pub const fn as_char(self) -> char {
        match self {
            Self::Plus => '+',
            Self::Caret => '^',
        }
    }
}

/// One classified URC line, borrowed from the engine's line buffer for
/// the duration of dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtEvent<'a> {
    pub prefix: UrcPrefix,
    /// Line text after the prefix, terminator stripped.
    pub payload: &'a str,
}

impl<'a> AtEvent<'a> {
    /// Code name: the payload up to the first `:`.
    pub fn name(&self) -> &'a str {
        self.payload
            .split_once(':')
            .map_or(self.payload, |(name, _)| name)
            .trim_end()
    }

    /// `true` when the code name equals `name` (e.g. `"CREG"`).
    pub fn is(&self, name: &str) -> bool {
        self.name() == name
    }

    /// Parameter text after the `:`, leading spaces trimmed.
    pub fn params(&self) -> Option<&'a str> {
        self.payload.split_once(':').map(|(_, p)| p.trim_start())
    }
}

impl fmt::Display for AtEvent<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.prefix.as_char(), self.payload)
    }
}

/// Classify one line (LF already removed).  A trailing CR is treated as
/// part of the terminator.
pub fn classify(line: &[u8]) -> Option<AtEvent<'_>> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    if line.len() <= 1 {
        return None;
    }
    let prefix = match line[0] {
        b'+' => UrcPrefix::Plus,
        b'^' => UrcPrefix::Caret,
        _ => return None,
    };
    let payload = core::str::from_utf8(&line[1..]).ok()?;
    Some(AtEvent { prefix, payload })
}

/// Receives dispatched URCs.
///
/// Called synchronously from the foreground while the engine holds its
/// line buffer.  Implementations that need to record state use interior
/// mutability (`Cell`, `RefCell`, atomics).
pub trait UrcListener {
    fn on_urc(&self, event: &AtEvent<'_>);
}

// ── Registry ──────────────────────────────────────────────────

/// Fixed set of `K` listener slots, dispatched in slot order.
pub struct ListenerRegistry<'l, const K: usize = MAX_URC_LISTENERS> {
    slots: [Option<&'l dyn UrcListener>; K],
}

impl<'l, const K: usize> ListenerRegistry<'l, K> {
    pub const fn new() -> Self {
        Self { slots: [None; K] }
    }

    /// Put `listener` in the first empty slot.  Returns `false` and
    /// changes nothing when every slot is taken.
    pub fn register(&mut self, listener: &'l dyn UrcListener) -> bool {
        match self.slots.iter_mut().find(|s| s.is_none()) {
            Some(slot) => {
                *slot = Some(listener);
                true
            }
            None => false,
        }
    }

    /// Clear the first slot holding `listener`.  Returns `false` when it
    /// was not registered.
    pub fn unregister(&mut self, listener: &dyn UrcListener) -> bool {
        let found = self
            .slots
            .iter_mut()
            .find(|s| s.is_some_and(|l| same_listener(l, listener)));
        match found {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    pub fn dispatch(&self, event: &AtEvent<'_>) {
        for listener in self.slots.iter().flatten() {
            listener.on_urc(event);
        }
    }

    /// Registered listeners.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    pub const fn capacity(&self) -> usize {
        K
    }
}

impl<const K: usize> Default for ListenerRegistry<'_, K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity by data pointer; vtables may be duplicated across codegen
/// units, so they are not compared.
fn same_listener(a: &dyn UrcListener, b: &dyn UrcListener) -> bool {
    core::ptr::addr_eq(a, b)
}
