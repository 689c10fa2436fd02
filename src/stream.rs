//! Byte stream abstraction between the AT engine and its serial link.
//!
//! Implementations:
//! - [`SerialPort`](crate::serial::SerialPort): the flow-controlled UART
//! - [`MemoryStream`]: scripted in-memory peer for host tests
//!
//! The engine is generic over `ByteStream`, so it never sees ring
//! buffers, pins or interrupts.  The provided methods carry the
//! stream-reading conventions the engine relies on: a per-byte timeout,
//! terminator consumption and a scanning `find`.

use core::fmt::Debug;

/// Byte-oriented, timeout-aware stream.
pub trait ByteStream {
    type Error: Debug;

    /// Write `data`, blocking as needed.  Returns the byte count written.
    fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error>;

    /// Pop one byte without waiting.
    fn read(&mut self) -> Option<u8>;

    /// Look at the next byte without consuming it.
    fn peek(&self) -> Option<u8>;

    /// Bytes readable without waiting.
    fn available(&self) -> usize;

    fn flush(&mut self) -> Result<(), Self::Error>;

    /// Per-byte timeout for [`timed_read`](Self::timed_read).
    fn set_timeout(&mut self, timeout_ms: u32);

    fn timeout(&self) -> u32;

    /// Wait up to [`timeout`](Self::timeout) for the next byte.  The
    /// timeout restarts for every byte.
    fn timed_read(&mut self) -> Option<u8>;

    /// Fill `buf`, stopping at the first timeout.
    fn read_bytes(&mut self, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.timed_read() {
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Fill `buf` until `terminator`, a timeout, or `buf` is full.  The
    /// terminator is consumed but not stored.
    fn read_bytes_until(&mut self, terminator: u8, buf: &mut [u8]) -> usize {
        let mut n = 0;
        while n < buf.len() {
            match self.timed_read() {
                Some(b) if b == terminator => break,
                Some(b) => {
                    buf[n] = b;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }

    /// Consume bytes until `needle` has been read or a timeout expires.
    /// An empty needle matches immediately.
    fn find(&mut self, needle: &[u8]) -> bool {
        if needle.is_empty() {
            return true;
        }
        let mut matched = 0;
        while let Some(b) = self.timed_read() {
            // Fall back along the needle's own borders, so "OOK" still
            // finds "OK".
            loop {
                if b == needle[matched] {
                    matched += 1;
                    break;
                }
                if matched == 0 {
                    break;
                }
                matched = longest_border(&needle[..matched]);
            }
            if matched == needle.len() {
                return true;
            }
        }
        false
    }
}

/// Length of the longest proper prefix of `s` that is also its suffix.
fn longest_border(s: &[u8]) -> usize {
    (1..s.len())
        .rev()
        .find(|&k| s[..k] == s[s.len() - k..])
        .unwrap_or(0)
}

// ── In-memory peer ───────────────────────────────────────────

#[cfg(any(test, feature = "std"))]
pub use memory::MemoryStream;

#[cfg(any(test, feature = "std"))]
mod memory {
    use std::collections::VecDeque;

    use super::ByteStream;

    /// Scripted modem stand-in.
    ///
    /// Bytes passed to [`feed`](Self::feed) are readable at once.  Bytes
    /// passed to [`reply`](Self::reply) wait until the host finishes its
    /// next command (a write ending in `\r`), which models a modem that
    /// answers only after it has seen the command.  Reads never block:
    /// an empty stream is a timed-out stream.
    #[derive(Debug, Default)]
    pub struct MemoryStream {
        rx: VecDeque<u8>,
        replies: VecDeque<Vec<u8>>,
        tx: Vec<u8>,
        timeout_ms: u32,
    }

    impl MemoryStream {
        pub fn new() -> Self {
            Self::default()
        }

        /// Make `bytes` readable now.
        pub fn feed(&mut self, bytes: &[u8]) -> &mut Self {
            self.rx.extend(bytes);
            self
        }

        /// Queue `bytes` to become readable after the next command.
        pub fn reply(&mut self, bytes: &[u8]) -> &mut Self {
            self.replies.push_back(bytes.to_vec());
            self
        }

        /// Everything the host wrote so far.
        pub fn written(&self) -> &[u8] {
            &self.tx
        }

        /// Take and clear the host's output.
        pub fn take_written(&mut self) -> Vec<u8> {
            core::mem::take(&mut self.tx)
        }

        /// Replies still waiting for a command.
        pub fn pending_replies(&self) -> usize {
            self.replies.len()
        }
    }

    impl ByteStream for MemoryStream {
        type Error = core::convert::Infallible;

        fn write(&mut self, data: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(data);
            if data.last() == Some(&b'\r') {
                if let Some(reply) = self.replies.pop_front() {
                    self.rx.extend(reply);
                }
            }
            Ok(data.len())
        }

        fn read(&mut self) -> Option<u8> {
            self.rx.pop_front()
        }

        fn peek(&self) -> Option<u8> {
            self.rx.front().copied()
        }

        fn available(&self) -> usize {
            self.rx.len()
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }

        fn set_timeout(&mut self, timeout_ms: u32) {
            self.timeout_ms = timeout_ms;
        }

        fn timeout(&self) -> u32 {
            self.timeout_ms
        }

        fn timed_read(&mut self) -> Option<u8> {
            self.rx.pop_front()
        }
    }
}
