//! Main-loop side of storage sessions.
//!
//! Each poll services at most one released half. Playback refills it from
//! the open file and marks the half holding the end of the data; recording
//! appends it to the file. Neither retries: any storage error stops the
//! session with the error latched.
//!
//! Storage calls here may block for milliseconds. Nothing in this module
//! holds a critical section across them; the transfer interrupt keeps
//! flipping halves through the shared atomics meanwhile.

use crate::buffer::{toggle_sign, Half};
use crate::constants::HALF_BUFFER_BYTES;
use crate::hal::{Board, RateClock};

use super::Engine;

impl<'a, B: Board> Engine<'a, B> {
    /// Refill the serviceable half for storage playback.
    pub(super) fn pump_playback(&mut self) {
        let shared = self.shared;
        let buffers = &shared.buffers;
        if !buffers.half_done() {
            return;
        }
        if shared.playback.any_last() {
            // Drain: the completion handler turns the channels off after the
            // last half has played.
            if !shared.transfer.is_enabled() {
                self.stop();
            }
            return;
        }

        buffers.acknowledge();
        let half = buffers.serviceable();
        let Some(reader) = self.reader.as_mut() else {
            self.stop();
            return;
        };

        // SAFETY: the hardware released `half`, and with no last mark set the
        // completion handler never writes the pool.
        let bytes = unsafe { buffers.half_bytes_mut(half) };
        let filled = match reader.fill(&mut self.storage, bytes) {
            Ok(n) => n,
            Err(code) => {
                self.stop();
                self.fail(code);
                return;
            }
        };
        if filled < HALF_BUFFER_BYTES {
            // Signed zero, which becomes DAC midscale below.
            bytes[filled..].fill(0);
            #[cfg(feature = "defmt")]
            defmt::debug!("end of data in {}", half);
        }
        // SAFETY: as above; `bytes` is not used again.
        toggle_sign(unsafe { buffers.region_mut(half.samples()) });
        if filled < HALF_BUFFER_BYTES {
            // Only once the half is complete: from here on the completion
            // handler may silence the other half.
            shared.playback.mark_last(half);
        }

        if shared.playback.take_kickstart() {
            // First half is ready. The kickstart survives a last mark so a
            // file shorter than one half still plays.
            self.clock.start(self.rate);
            shared.transfer.kickstart();
            buffers.set_position(Half::First, true);
        }
    }

    /// Append the serviceable half to the recording.
    pub(super) fn pump_record(&mut self) {
        let shared = self.shared;
        let buffers = &shared.buffers;
        if !buffers.half_done() {
            return;
        }
        buffers.acknowledge();
        let half = buffers.serviceable();
        let Some(writer) = self.writer.as_mut() else {
            return;
        };

        // SAFETY: the capture hardware moved on to the other half; nothing
        // else reads or writes this one until it comes back around.
        let bytes = unsafe { buffers.half_bytes(half) };
        if let Err(code) = writer.write(&mut self.storage, bytes) {
            self.stop();
            // After stop, so a finalize failure does not mask it.
            self.fail(code);
        }
    }
}
