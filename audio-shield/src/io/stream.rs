//! Link streaming bookkeeping.
//!
//! The host moves audio over the link in 128-byte blocks, eight per buffer
//! half. Playback (`C` then `D` blocks) counts free block slots; capture
//! (`I` then `J` requests) counts full ones. The transfer-complete
//! interrupt returns a whole half at a time while the main loop consumes
//! single blocks, so every read-modify-write runs in a critical section.

use core::cell::Cell;

use critical_section::Mutex;

use crate::buffer::Half;
use crate::constants::{BLOCKS_PER_HALF, BLOCKS_TOTAL, HALF_BUFFER_SAMPLES, STREAM_BLOCK_BYTES};

/// Samples in one stream block.
pub const BLOCK_SAMPLES: usize = STREAM_BLOCK_BYTES / 2;

/// Free and full block counts shared with the transfer-complete interrupt.
pub struct StreamCounters {
    free: Mutex<Cell<u8>>,
    full: Mutex<Cell<u8>>,
}

impl StreamCounters {
    pub const fn new() -> Self {
        Self {
            free: Mutex::new(Cell::new(0)),
            full: Mutex::new(Cell::new(0)),
        }
    }

    /// Playback start: both halves are free.
    pub fn reset_for_playback(&self) {
        critical_section::with(|cs| {
            self.free.borrow(cs).set(BLOCKS_TOTAL);
            self.full.borrow(cs).set(0);
        });
    }

    /// Capture start, and any stop: nothing free, nothing recorded.
    pub fn reset(&self) {
        critical_section::with(|cs| {
            self.free.borrow(cs).set(0);
            self.full.borrow(cs).set(0);
        });
    }

    pub fn free(&self) -> u8 {
        critical_section::with(|cs| self.free.borrow(cs).get())
    }

    pub fn full(&self) -> u8 {
        critical_section::with(|cs| self.full.borrow(cs).get())
    }

    /// Claim one free slot for an incoming block.
    pub fn take_free(&self) -> bool {
        critical_section::with(|cs| {
            let free = self.free.borrow(cs);
            match free.get() {
                0 => false,
                n => {
                    free.set(n - 1);
                    true
                }
            }
        })
    }

    /// A played half is free again.
    pub fn release_half(&self) {
        critical_section::with(|cs| {
            let free = self.free.borrow(cs);
            free.set((free.get() + BLOCKS_PER_HALF).min(BLOCKS_TOTAL));
        });
    }

    /// Claim one recorded block for the host.
    pub fn take_full(&self) -> bool {
        critical_section::with(|cs| {
            let full = self.full.borrow(cs);
            match full.get() {
                0 => false,
                n => {
                    full.set(n - 1);
                    true
                }
            }
        })
    }

    /// A captured half is ready. Saturates at the pool size; older blocks are
    /// overwritten by then.
    pub fn fill_half(&self) {
        critical_section::with(|cs| {
            let full = self.full.borrow(cs);
            full.set((full.get() + BLOCKS_PER_HALF).min(BLOCKS_TOTAL));
        });
    }
}

impl Default for StreamCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Position of the next stream block within the buffer pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BlockCursor {
    half: Half,
    /// Sample offset within `half`.
    offset: usize,
}

impl BlockCursor {
    pub const fn new() -> Self {
        Self {
            half: Half::First,
            offset: 0,
        }
    }

    pub fn half(&self) -> Half {
        self.half
    }

    /// Sample range of the current block within the two-half pool.
    pub fn range(&self) -> core::ops::Range<usize> {
        let start = self.half.sample_offset() + self.offset;
        start..start + BLOCK_SAMPLES
    }

    /// Step to the next block. Returns `true` when a half was completed.
    pub fn advance(&mut self) -> bool {
        self.offset += BLOCK_SAMPLES;
        if self.offset >= HALF_BUFFER_SAMPLES {
            self.offset = 0;
            self.half = self.half.other();
            return true;
        }
        false
    }
}

impl Default for BlockCursor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn playback_starts_with_every_block_free() {
        let counters = StreamCounters::new();
        counters.reset_for_playback();
        assert_eq!(counters.free(), 16);
        assert_eq!(counters.full(), 0);
    }

    #[test]
    fn free_blocks_exhaust_then_refuse() {
        let counters = StreamCounters::new();
        counters.reset_for_playback();
        for _ in 0..16 {
            assert!(counters.take_free());
        }
        assert!(!counters.take_free());
        assert_eq!(counters.free(), 0);
    }

    #[test]
    fn release_caps_at_pool_size() {
        let counters = StreamCounters::new();
        counters.reset_for_playback();
        counters.take_free();
        counters.release_half();
        assert_eq!(counters.free(), 16);
    }

    #[test]
    fn full_blocks_accumulate_per_half() {
        let counters = StreamCounters::new();
        counters.reset();
        assert!(!counters.take_full());
        counters.fill_half();
        assert_eq!(counters.full(), 8);
        assert!(counters.take_full());
        assert_eq!(counters.full(), 7);
        counters.fill_half();
        counters.fill_half();
        assert_eq!(counters.full(), 16);
    }

    #[test]
    fn reset_empties_both_counts() {
        let counters = StreamCounters::new();
        counters.reset_for_playback();
        counters.fill_half();
        counters.reset();
        assert_eq!(counters.free(), 0);
        assert_eq!(counters.full(), 0);
        assert!(!counters.take_free());
    }

    #[test]
    fn cursor_walks_eight_blocks_per_half() {
        let mut cursor = BlockCursor::new();
        assert_eq!(cursor.range(), 0..64);
        for _ in 0..7 {
            assert!(!cursor.advance());
        }
        assert_eq!(cursor.range(), 448..512);
        assert!(cursor.advance());
        assert_eq!(cursor.half(), Half::Second);
        assert_eq!(cursor.range(), 512..576);
        for _ in 0..7 {
            cursor.advance();
        }
        assert!(cursor.advance());
        assert_eq!(cursor.half(), Half::First);
    }
}
