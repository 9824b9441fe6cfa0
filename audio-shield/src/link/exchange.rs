//! Byte-level half of the link protocol.
//!
//! The host clocks one byte in and one byte out at a time. Whatever sits in
//! the data register when the host starts a byte is what it reads, so the
//! handler for byte N must load the response for byte N+1 before it
//! returns:
//!
//! ```text
//! host   ──►  cmd    d0     d1    ...  dn-1
//! device ◄──  status r0     r1    ...  rn-1   BUSY BUSY ...
//!             ▲ staged at arm time; each on_byte() stages the next one
//! ```
//!
//! [`LinkExchange`] is a single-slot mailbox between the link interrupt and
//! the main loop:
//!
//! - While armed (`remaining > 0`) the interrupt owns the buffer. It stores
//!   each received byte and returns the next staged one.
//! - The last byte of an exchange disarms it and raises `pending`. From then
//!   on the main loop owns the buffer through a [`Completed`] guard until it
//!   re-arms. Bytes arriving in between are answered with `BUSY` and
//!   dropped, never stored.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};

use crate::constants::EXCHANGE_BUFFER_BYTES;
use crate::session::SessionState;

/// Byte answered whenever no exchange is armed.
pub const BUSY: u8 = SessionState::Busy as u8;

/// What the completed exchange carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// A single command byte.
    AwaitingCommand,
    /// The payload bytes that follow a command.
    AwaitingData,
}

/// Exchange buffer shared by the link interrupt and the main loop.
pub struct LinkExchange {
    buffer: UnsafeCell<[u8; EXCHANGE_BUFFER_BYTES]>,
    /// Next buffer index the interrupt writes (interrupt side only while armed).
    pos: AtomicUsize,
    /// Bytes left in the armed exchange; zero means the main loop owns the buffer.
    remaining: AtomicUsize,
    /// Set by the interrupt when an exchange completes, cleared by the main loop.
    pending: AtomicBool,
    data_phase: AtomicBool,
    /// Command whose payload the data phase is collecting.
    command: AtomicU8,
    /// Bytes the host sent while nothing was armed.
    dropped: AtomicU32,
}

// SAFETY: the buffer has exactly one owner at a time. The interrupt touches
// it only while `remaining > 0`; the main loop only after observing
// `remaining == 0` (via `pending` or before the first arm) and until it
// publishes a new `remaining` with Release ordering.
unsafe impl Sync for LinkExchange {}

impl LinkExchange {
    pub const fn new() -> Self {
        Self {
            buffer: UnsafeCell::new([0; EXCHANGE_BUFFER_BYTES]),
            pos: AtomicUsize::new(0),
            remaining: AtomicUsize::new(0),
            pending: AtomicBool::new(false),
            data_phase: AtomicBool::new(false),
            command: AtomicU8::new(0),
            dropped: AtomicU32::new(0),
        }
    }

    /// Link interrupt: store `received`, return the byte to load for the
    /// host's next clock.
    pub fn on_byte(&self, received: u8) -> u8 {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining == 0 {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return BUSY;
        }

        let pos = self.pos.load(Ordering::Relaxed);
        // SAFETY: `remaining > 0`, so the main loop has handed the buffer
        // to this side and will not touch it until `pending` is raised.
        let buffer = unsafe { &mut *self.buffer.get() };
        buffer[pos] = received;

        if remaining == 1 {
            self.pos.store(0, Ordering::Relaxed);
            self.remaining.store(0, Ordering::Relaxed);
            self.pending.store(true, Ordering::Release);
            return BUSY;
        }

        self.pos.store(pos + 1, Ordering::Relaxed);
        self.remaining.store(remaining - 1, Ordering::Relaxed);
        buffer[pos + 1]
    }

    /// Main loop: claim the completed exchange, if any.
    pub fn take(&self) -> Option<Completed<'_>> {
        if !self.pending.load(Ordering::Acquire) {
            return None;
        }
        self.pending.store(false, Ordering::Relaxed);
        Some(Completed { exchange: self })
    }

    /// Arm the very first command phase. Does nothing (and returns `None`)
    /// once the exchange is running.
    pub fn start(&self, status: u8) -> Option<u8> {
        if self.remaining.load(Ordering::Acquire) != 0 || self.pending.load(Ordering::Acquire) {
            return None;
        }
        Some(self.arm(false, 1, |buf| buf[0] = status))
    }

    /// Whether an exchange is armed and collecting bytes.
    pub fn is_armed(&self) -> bool {
        self.remaining.load(Ordering::Acquire) != 0
    }

    /// Bytes received while disarmed, since startup.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Publish a new exchange of `len` bytes. Caller must own the buffer.
    fn arm(&self, data_phase: bool, len: usize, stage: impl FnOnce(&mut [u8; EXCHANGE_BUFFER_BYTES])) -> u8 {
        debug_assert!(len > 0 && len <= EXCHANGE_BUFFER_BYTES);
        // SAFETY: `remaining == 0`; the interrupt ignores the buffer until
        // the Release store below.
        let buffer = unsafe { &mut *self.buffer.get() };
        stage(buffer);
        self.data_phase.store(data_phase, Ordering::Relaxed);
        self.pos.store(0, Ordering::Relaxed);
        self.remaining.store(len, Ordering::Release);
        buffer[0]
    }
}

impl Default for LinkExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive main-loop access to a completed exchange.
///
/// Consumed by re-arming; the returned byte must be preloaded into the link
/// data register.
pub struct Completed<'a> {
    exchange: &'a LinkExchange,
}

impl<'a> Completed<'a> {
    pub fn phase(&self) -> Phase {
        if self.exchange.data_phase.load(Ordering::Relaxed) {
            Phase::AwaitingData
        } else {
            Phase::AwaitingCommand
        }
    }

    /// Command the data phase belongs to.
    pub fn command(&self) -> u8 {
        self.exchange.command.load(Ordering::Relaxed)
    }

    /// The whole buffer as left by the interrupt.
    pub fn received(&self) -> &[u8; EXCHANGE_BUFFER_BYTES] {
        // SAFETY: the guard exists only while the main loop owns the buffer.
        unsafe { &*self.exchange.buffer.get() }
    }

    /// Response area for the upcoming data phase.
    pub fn response_mut(&mut self) -> &mut [u8; EXCHANGE_BUFFER_BYTES] {
        // SAFETY: as above, and `&mut self` keeps the view unique.
        unsafe { &mut *self.exchange.buffer.get() }
    }

    /// Expect a new command; the host reads `status` while sending it.
    pub fn arm_command(self, status: u8) -> u8 {
        self.exchange.arm(false, 1, |buf| buf[0] = status)
    }

    /// Collect `len` payload bytes for `command`, clocking out whatever was
    /// staged through [`response_mut`](Self::response_mut).
    pub fn arm_data(self, command: u8, len: usize) -> u8 {
        self.exchange.command.store(command, Ordering::Relaxed);
        self.exchange.arm(true, len, |_| {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disarmed_answers_busy_and_drops() {
        let link = LinkExchange::new();
        assert_eq!(link.on_byte(b'?'), BUSY);
        assert_eq!(link.dropped(), 1);
        assert!(link.take().is_none());
    }

    #[test]
    fn command_byte_completes_exchange() {
        let link = LinkExchange::new();
        assert_eq!(link.start(0), Some(0));
        assert!(link.start(0).is_none());

        assert_eq!(link.on_byte(b'E'), BUSY);
        let done = link.take().unwrap();
        assert_eq!(done.phase(), Phase::AwaitingCommand);
        assert_eq!(done.received()[0], b'E');
        assert!(link.take().is_none());
    }

    #[test]
    fn response_is_staged_one_byte_ahead() {
        let link = LinkExchange::new();
        link.start(0);
        link.on_byte(b'Z');

        let mut done = link.take().unwrap();
        done.response_mut()[..3].copy_from_slice(&[10, 20, 30]);
        assert_eq!(done.arm_data(b'Z', 3), 10);

        // Each byte returns the response for the host's next clock.
        assert_eq!(link.on_byte(0xAA), 20);
        assert_eq!(link.on_byte(0xBB), 30);
        assert_eq!(link.on_byte(0xCC), BUSY);

        let done = link.take().unwrap();
        assert_eq!(done.phase(), Phase::AwaitingData);
        assert_eq!(done.command(), b'Z');
        assert_eq!(&done.received()[..3], &[0xAA, 0xBB, 0xCC]);
    }

    #[test]
    fn payload_completes_only_after_declared_length() {
        let link = LinkExchange::new();
        link.start(0);
        link.on_byte(b'V');
        link.take().unwrap().arm_data(b'V', 4);

        for b in 0..3 {
            link.on_byte(b);
            assert!(link.take().is_none());
        }
        link.on_byte(3);
        assert!(link.take().is_some());
    }

    #[test]
    fn unconsumed_exchange_is_not_overwritten() {
        let link = LinkExchange::new();
        link.start(0);
        link.on_byte(b'Q');

        // Host keeps clocking before the main loop has looked.
        assert_eq!(link.on_byte(b'X'), BUSY);
        assert_eq!(link.on_byte(b'Y'), BUSY);

        let done = link.take().unwrap();
        assert_eq!(done.received()[0], b'Q');
        assert_eq!(link.dropped(), 2);
        assert_eq!(done.arm_command(3), 3);
        assert!(link.is_armed());
    }

    #[test]
    fn full_stream_block_fits() {
        let link = LinkExchange::new();
        link.start(0);
        link.on_byte(b'D');
        link.take().unwrap().arm_data(b'D', EXCHANGE_BUFFER_BYTES);
        for i in 0..EXCHANGE_BUFFER_BYTES {
            link.on_byte(i as u8);
        }
        let done = link.take().unwrap();
        assert_eq!(done.received()[EXCHANGE_BUFFER_BYTES - 1], (EXCHANGE_BUFFER_BYTES - 1) as u8);
    }
}
