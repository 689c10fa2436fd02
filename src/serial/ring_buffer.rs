//! Lock-free single-producer / single-consumer byte ring.
//!
//! One ring per UART direction.  The interrupt handler produces into the
//! receive ring and consumes from the transmit ring; the foreground does
//! the opposite.
//!
//! ```text
//!          producer                       consumer
//!   write slot[head] ──▶ head = head+1   read slot[tail] ──▶ tail = tail+1
//!   (Release)                             (Release)
//! ```
//!
//! Capacity `N` gives `N - 1` usable slots: `head == tail` is empty and
//! `(head + 1) % N == tail` is full, so the two states never alias.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicUsize, Ordering};

pub struct RingBuffer<const N: usize> {
    buf: UnsafeCell<[u8; N]>,
    head: AtomicUsize,
    tail: AtomicUsize,
}

// SAFETY: slot `head` is only written by the producer before `head` is
// published, and slot `tail` is only read by the consumer before `tail`
// is published.  The safe API hands out at most one producer and one
// consumer (`split` / `&mut self`), and crate-internal callers of the
// unchecked entry points uphold the same discipline.
unsafe impl<const N: usize> Sync for RingBuffer<N> {}

impl<const N: usize> RingBuffer<N> {
    const VALID: () = assert!(N >= 2, "ring needs at least one usable slot");

    pub const fn new() -> Self {
        let () = Self::VALID;
        Self {
            buf: UnsafeCell::new([0; N]),
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }

    /// Usable slots (`N - 1`).
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Bytes queued.
    pub fn available(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        (N + head - tail) % N
    }

    /// Slots free.  `free_space() + available() == capacity()`.
    pub fn free_space(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire) == self.tail.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let head = self.head.load(Ordering::Acquire);
        (head + 1) % N == self.tail.load(Ordering::Acquire)
    }

    /// Queue `byte`.  Returns `false` (and drops nothing already queued)
    /// when full.
    pub fn push(&mut self, byte: u8) -> bool {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.enqueue(byte) }
    }

    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: `&mut self` excludes every other producer and consumer.
        unsafe { self.dequeue() }
    }

    pub fn peek(&mut self) -> Option<u8> {
        // SAFETY: as above.
        unsafe { self.front() }
    }

    pub fn clear(&mut self) {
        // SAFETY: as above.
        unsafe { self.discard() }
    }

    /// Split into the two halves that may run in different contexts.
    pub fn split(&mut self) -> (Producer<'_, N>, Consumer<'_, N>) {
        // SAFETY: the `&mut` borrow is held by both halves, so no other
        // producer or consumer can exist while they live.
        unsafe { (Producer::new_unchecked(self), Consumer::new_unchecked(self)) }
    }

    // ── Unchecked entry points ────────────────────────────────
    //
    // Callers guarantee they are the only producer (`enqueue`) or the
    // only consumer (`dequeue`, `front`, `discard`) at the time of the
    // call.

    pub(crate) unsafe fn enqueue(&self, byte: u8) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let next = (head + 1) % N;
        if next == self.tail.load(Ordering::Acquire) {
            return false;
        }
        // SAFETY: `head < N`; the consumer never reads slot `head` until
        // the store below publishes it.
        unsafe { self.buf.get().cast::<u8>().add(head).write(byte) };
        self.head.store(next, Ordering::Release);
        true
    }

    pub(crate) unsafe fn dequeue(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: `tail < N`; the producer never writes slot `tail` until
        // the store below releases it.
        let byte = unsafe { self.buf.get().cast::<u8>().add(tail).read() };
        self.tail.store((tail + 1) % N, Ordering::Release);
        Some(byte)
    }

    pub(crate) unsafe fn front(&self) -> Option<u8> {
        let tail = self.tail.load(Ordering::Relaxed);
        if tail == self.head.load(Ordering::Acquire) {
            return None;
        }
        // SAFETY: see `dequeue`; the slot stays owned by the consumer.
        Some(unsafe { self.buf.get().cast::<u8>().add(tail).read() })
    }

    pub(crate) unsafe fn discard(&self) {
        let head = self.head.load(Ordering::Acquire);
        self.tail.store(head, Ordering::Release);
    }
}

impl<const N: usize> Default for RingBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Split halves ──────────────────────────────────────────────

/// Producing half.  Not `Clone`: there is exactly one.
pub struct Producer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<'a, const N: usize> Producer<'a, N> {
    /// # Safety
    /// No other producer for `ring` may exist while this one lives.
    pub(crate) unsafe fn new_unchecked(ring: &'a RingBuffer<N>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    pub fn push(&mut self, byte: u8) -> bool {
        // SAFETY: this is the unique producer.
        unsafe { self.ring.enqueue(byte) }
    }

    pub fn free_space(&self) -> usize {
        self.ring.free_space()
    }

    pub fn available(&self) -> usize {
        self.ring.available()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}

/// Consuming half.  Not `Clone`: there is exactly one.
pub struct Consumer<'a, const N: usize> {
    ring: &'a RingBuffer<N>,
    _not_sync: PhantomData<core::cell::Cell<()>>,
}

impl<'a, const N: usize> Consumer<'a, N> {
    /// # Safety
    /// No other consumer for `ring` may exist while this one lives.
    pub(crate) unsafe fn new_unchecked(ring: &'a RingBuffer<N>) -> Self {
        Self {
            ring,
            _not_sync: PhantomData,
        }
    }

    pub fn pop(&mut self) -> Option<u8> {
        // SAFETY: this is the unique consumer.
        unsafe { self.ring.dequeue() }
    }

    pub fn peek(&self) -> Option<u8> {
        // SAFETY: this is the unique consumer; `&self` cannot overlap a
        // `pop` through the same handle.
        unsafe { self.ring.front() }
    }

    /// Drop everything queued so far.
    pub fn clear(&mut self) {
        // SAFETY: this is the unique consumer.
        unsafe { self.ring.discard() }
    }

    pub fn available(&self) -> usize {
        self.ring.available()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }
}
