//! Double-buffered transfer between the converters and the buffer pool.
//!
//! Two hardware channels, one per half, chain into each other so the
//! hardware alternates halves without software help:
//!
//! ```text
//!                 ┌──────── channel 0 ────────┐
//!  ADC result ──► │ Half::First  (1024 bytes)  │ ─┐ block done: enable ch1,
//!    or           └────────────────────────────┘  │ raise completion(First)
//!  DAC data   ◄── ┌──────── channel 1 ────────┐  │
//!                 │ Half::Second (1024 bytes)  │ ◄┘ block done: enable ch0,
//!                 └────────────────────────────┘    raise completion(Second)
//! ```
//!
//! Each completion flips [`BufferPair::active`] and sets `half_done`. The
//! session decides what the completion means for the running mode.
//!
//! The coordinator is driven from the main loop and from both the transfer
//! and converter interrupts, so every method takes `&self` and holds a
//! critical section only around the channel register access itself.
//!
//! ## Usage
//!
//! ```ignore
//! transfer.begin(Direction::Playback, stereo, &pair);
//! transfer.kickstart();
//!
//! // Transfer-complete interrupt for channel n:
//! transfer.on_half_complete(&pair, half);
//!
//! // Stopping, from the main loop:
//! transfer.halt(&pair)?;
//! ```

use core::cell::RefCell;

use critical_section::Mutex;

use crate::buffer::{BufferPair, Half};
use crate::constants::{HALF_BUFFER_BYTES, SETTLE_SPIN_LIMIT};
use crate::fail::{FailMajor, FailMinor, FailureCode};
use crate::hal::{Burst, ChannelConfig, Direction, DmaChannels};

/// Programs and supervises the ping-pong transfer channels.
pub struct TransferCoordinator<D> {
    dma: Mutex<RefCell<D>>,
}

impl<D: DmaChannels> TransferCoordinator<D> {
    pub const fn new(dma: D) -> Self {
        Self {
            dma: Mutex::new(RefCell::new(dma)),
        }
    }

    /// Run `f` on the channels inside a critical section.
    pub fn with_dma<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        critical_section::with(|cs| {
            let mut dma = self.dma.borrow_ref_mut(cs);
            f(&mut *dma)
        })
    }

    /// Configure both channels for `direction`. Nothing moves until
    /// [`kickstart`](Self::kickstart).
    ///
    /// The channels must be idle; call [`halt`](Self::halt) first otherwise.
    pub fn begin(&self, direction: Direction, stereo: bool, pair: &BufferPair) {
        let config = ChannelConfig {
            direction,
            burst: Burst::for_channels(stereo),
            half_addresses: [
                pair.half_address(Half::First),
                pair.half_address(Half::Second),
            ],
            half_bytes: HALF_BUFFER_BYTES as u16,
        };
        self.with_dma(|dma| dma.configure(&config));
    }

    /// Enable channel 0; the chain runs on its own from there.
    pub fn kickstart(&self) {
        self.with_dma(|dma| dma.enable(Half::First));
    }

    /// Request both channels off without waiting.
    pub fn off(&self) {
        self.with_dma(|dma| dma.disable());
    }

    pub fn is_enabled(&self) -> bool {
        self.with_dma(|dma| dma.is_enabled())
    }

    /// Poll until the controller and both channels report disabled.
    ///
    /// Each poll is its own critical section. Gives up after
    /// [`SETTLE_SPIN_LIMIT`] polls with a `Transfer` failure; the caller still
    /// resets the channels.
    pub fn wait_for_disable(&self) -> Result<(), FailureCode> {
        for _ in 0..SETTLE_SPIN_LIMIT {
            if !self.is_enabled() {
                return Ok(());
            }
            core::hint::spin_loop();
        }
        Err(FailureCode::new(FailMajor::Transfer, FailMinor::SettleTimeout))
    }

    /// Force both channels disabled and forget any pending completion.
    pub fn reset(&self, pair: &BufferPair) {
        self.with_dma(|dma| dma.reset());
        pair.acknowledge();
    }

    /// `off`, `wait_for_disable`, `reset`: the full teardown used by every stop.
    pub fn halt(&self, pair: &BufferPair) -> Result<(), FailureCode> {
        self.off();
        let settled = self.wait_for_disable();
        self.reset(pair);
        settled
    }

    /// Completion signal for `finished`: the hardware moved on to the other half.
    pub fn on_half_complete(&self, pair: &BufferPair, finished: Half) {
        pair.complete(finished);
    }
}
