use core::cell::UnsafeCell;
use core::ops::Range;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::constants::{HALF_BUFFER_BYTES, HALF_BUFFER_SAMPLES, TOTAL_SAMPLES};

use super::format::SILENCE;

// Storage and link code hands the halves to byte-oriented collaborators as
// little-endian sample streams.
#[cfg(target_endian = "big")]
compile_error!("audio-shield assumes a little-endian target");

/// One of the two halves of the ping-pong buffer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Half {
    /// Half 0, serviced by transfer channel 0.
    First,
    /// Half 1, serviced by transfer channel 1.
    Second,
}

impl Half {
    pub const fn other(self) -> Self {
        match self {
            Half::First => Half::Second,
            Half::Second => Half::First,
        }
    }

    pub const fn index(self) -> usize {
        match self {
            Half::First => 0,
            Half::Second => 1,
        }
    }

    const fn from_index(index: u8) -> Self {
        if index == 0 {
            Half::First
        } else {
            Half::Second
        }
    }

    /// Sample offset of this half within the logical two-half buffer.
    pub const fn sample_offset(self) -> usize {
        self.index() * HALF_BUFFER_SAMPLES
    }

    /// Sample range of this half within the logical two-half buffer.
    pub const fn samples(self) -> Range<usize> {
        self.sample_offset()..self.sample_offset() + HALF_BUFFER_SAMPLES
    }
}

/// Sample storage for both halves, contiguous so effects can treat it as one
/// circular buffer of [`TOTAL_SAMPLES`].
#[repr(C, align(4))]
pub struct BufferPool {
    samples: [u16; TOTAL_SAMPLES],
}

impl BufferPool {
    /// A pool holding DAC silence.
    pub const fn new() -> Self {
        Self {
            samples: [SILENCE; TOTAL_SAMPLES],
        }
    }

    /// Both halves as one slice.
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [u16] {
        &mut self.samples
    }

    pub fn half(&self, half: Half) -> &[u16] {
        &self.samples[half.samples()]
    }

    pub fn half_mut(&mut self, half: Half) -> &mut [u16] {
        &mut self.samples[half.samples()]
    }

    /// Fill both halves with DAC silence.
    pub fn clear(&mut self) {
        self.samples.fill(SILENCE);
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new()
    }
}

/// The buffer pool plus the hardware position within it.
///
/// Exactly one half is hardware-active at a time. The other half is the only
/// one software may touch, and `half_done` says it has just been released by
/// the hardware and still needs servicing.
///
/// The position lives in atomics so the transfer interrupt can move it while
/// the main loop is busy with storage. The samples are reached through
/// `unsafe` views: each caller promises it is the only context touching the
/// region it asks for, which the hand-over above gives it.
pub struct BufferPair {
    pool: UnsafeCell<BufferPool>,
    active: AtomicU8,
    half_done: AtomicBool,
}

// SAFETY: The position flags are atomics. The pool is only reached through
// `region`, `region_mut` and `pool_mut`, whose contracts keep each context on
// the samples it currently owns.
unsafe impl Sync for BufferPair {}

impl BufferPair {
    pub const fn new() -> Self {
        Self {
            pool: UnsafeCell::new(BufferPool::new()),
            active: AtomicU8::new(0),
            half_done: AtomicBool::new(false),
        }
    }

    /// Half the hardware is currently transferring.
    pub fn active(&self) -> Half {
        Half::from_index(self.active.load(Ordering::Acquire))
    }

    /// Half software may service.
    pub fn serviceable(&self) -> Half {
        self.active().other()
    }

    pub fn half_done(&self) -> bool {
        self.half_done.load(Ordering::Acquire)
    }

    /// Place the hardware position explicitly, at session start.
    pub fn set_position(&self, active: Half, half_done: bool) {
        self.active.store(active.index() as u8, Ordering::Release);
        self.half_done.store(half_done, Ordering::Release);
    }

    /// Hardware finished `finished`; it moves on to the other half.
    pub fn complete(&self, finished: Half) {
        self.active
            .store(finished.other().index() as u8, Ordering::Release);
        self.half_done.store(true, Ordering::Release);
    }

    /// Mark the serviceable half as handled.
    pub fn acknowledge(&self) {
        self.half_done.store(false, Ordering::Release);
    }

    /// Address of a half, for programming transfer channels.
    pub fn half_address(&self, half: Half) -> usize {
        self.half_ptr(half) as usize
    }

    fn half_ptr(&self, half: Half) -> *mut u8 {
        self.base().wrapping_add(half.sample_offset()).cast::<u8>()
    }

    fn base(&self) -> *mut u16 {
        // `BufferPool` is `repr(C)` with the sample array as its only field.
        self.pool.get().cast::<u16>()
    }

    /// Samples `range` of the two-half pool.
    ///
    /// # Safety
    ///
    /// No other context may write any of `range` while the view is alive.
    pub unsafe fn region(&self, range: Range<usize>) -> &[u16] {
        assert!(range.start <= range.end && range.end <= TOTAL_SAMPLES);
        // SAFETY: in bounds per the assert; no writer per the caller.
        unsafe { core::slice::from_raw_parts(self.base().add(range.start), range.len()) }
    }

    /// Samples `range` of the two-half pool, writable.
    ///
    /// # Safety
    ///
    /// The caller must be the only context touching any of `range` while the
    /// view is alive.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn region_mut(&self, range: Range<usize>) -> &mut [u16] {
        assert!(range.start <= range.end && range.end <= TOTAL_SAMPLES);
        // SAFETY: in bounds per the assert; exclusive per the caller.
        unsafe { core::slice::from_raw_parts_mut(self.base().add(range.start), range.len()) }
    }

    /// A half viewed as the little-endian byte stream the hardware sees.
    ///
    /// # Safety
    ///
    /// As for [`region`](Self::region) over the whole half.
    pub unsafe fn half_bytes(&self, half: Half) -> &[u8] {
        // SAFETY: u16 has no padding and any byte pattern is a valid u8; the
        // view covers exactly the memory of `half`.
        unsafe { core::slice::from_raw_parts(self.half_ptr(half), HALF_BUFFER_BYTES) }
    }

    /// # Safety
    ///
    /// As for [`region_mut`](Self::region_mut) over the whole half.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn half_bytes_mut(&self, half: Half) -> &mut [u8] {
        // SAFETY: as above; any byte pattern is also a valid u16.
        unsafe {
            core::slice::from_raw_parts_mut(self.half_ptr(half), HALF_BUFFER_BYTES)
        }
    }

    /// The whole pool.
    ///
    /// # Safety
    ///
    /// The caller must be the only software context touching the pool while
    /// the view is alive: the converter interrupt during pass-through, or the
    /// main loop with the effects deselected.
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn pool_mut(&self) -> &mut BufferPool {
        // SAFETY: exclusive per the caller.
        unsafe { &mut *self.pool.get() }
    }

    /// Read-only look at the whole pool for tests, which run one context at a
    /// time.
    #[cfg(test)]
    pub(crate) fn pool(&self) -> &BufferPool {
        // SAFETY: tests never hold a writable view across this call.
        unsafe { &*self.pool.get() }
    }
}

impl Default for BufferPair {
    fn default() -> Self {
        Self::new()
    }
}
