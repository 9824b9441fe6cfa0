//! Sample-rate pass-through effects.
//!
//! In pass-through mode the converter-complete interrupt hands every sample
//! pair to [`EffectsProcessor::process`], which writes it into the buffer
//! pool at a circular cursor spanning both halves. The transfer channels
//! play the pool back in DAC format behind the cursor.
//!
//! | Code | Effect | Stored value | Tap | Kickstart when cursor |
//! |------|--------|--------------|-----|-----------------------|
//! | `'0'` | [`Effect::Direct`] | input | none | after first store |
//! | `'1'` | [`Effect::Echo`] | `(tap >> 1) + input` into the tap slot | 510 samples per channel | `> TOTAL_SAMPLES - 4` |
//! | `'2'` | [`Effect::Comb`] | `input - tap` into the tap slot | 64 samples per channel | `> 128` |
//! | `'3'`–`'9'` | [`Effect::Unassigned`] | nothing | | never |
//!
//! Echo and comb store the raw signed input at the cursor first. The tap
//! slot still holds the raw sample from one delay earlier, which is mixed
//! and converted to DAC format in place. Delaying the kickstart lets the
//! tap fill with primed data before playback reaches it.
//!
//! ## Usage
//!
//! ```ignore
//! // Converter-complete interrupt
//! let (l, r) = converter.read_pair();
//! if effects.process(pool, l, r) {
//!     transfer.kickstart();
//! }
//! ```

use crate::buffer::{to_dac, BufferPool};
use crate::constants::{HALF_BUFFER_SAMPLES, TOTAL_SAMPLES};

/// Echo tap distance per channel, in samples.
pub const ECHO_DELAY: usize = HALF_BUFFER_SAMPLES - 2;

/// Comb tap distance per channel, in samples.
pub const COMB_DELAY: usize = 64;

const ECHO_KICKSTART_AFTER: usize = TOTAL_SAMPLES - 4;
const COMB_KICKSTART_AFTER: usize = 128;

/// Pass-through effect selected by a `'0'`–`'9'` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    /// Straight copy to the output.
    Direct,
    /// Decaying echo.
    Echo,
    /// First-order comb filter.
    Comb,
    /// A code with no effect assigned; passes nothing through.
    Unassigned(u8),
}

impl Effect {
    /// Map a command byte, `None` outside `'0'..='9'`.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            b'0' => Some(Effect::Direct),
            b'1' => Some(Effect::Echo),
            b'2' => Some(Effect::Comb),
            b'3'..=b'9' => Some(Effect::Unassigned(code)),
            _ => None,
        }
    }
}

/// Effect state for one pass-through session.
pub struct EffectsProcessor {
    effect: Option<Effect>,
    stereo: bool,
    /// Next sample index within the two-half buffer.
    cursor: usize,
    kickstart_pending: bool,
}

impl EffectsProcessor {
    pub const fn new() -> Self {
        Self {
            effect: None,
            stereo: false,
            cursor: 0,
            kickstart_pending: false,
        }
    }

    /// Arm `effect` from the start of the buffer.
    pub fn select(&mut self, effect: Effect, stereo: bool) {
        self.effect = Some(effect);
        self.stereo = stereo;
        self.cursor = 0;
        self.kickstart_pending = true;
    }

    /// Deselect, turning [`process`](Self::process) into a no-op.
    pub fn deselect(&mut self) {
        self.effect = None;
        self.kickstart_pending = false;
    }

    pub fn selected(&self) -> Option<Effect> {
        self.effect
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Handle one converter result. Returns `true` exactly once per
    /// selection, when the transfer channels should be kickstarted.
    pub fn process(&mut self, pool: &mut BufferPool, left: i16, right: i16) -> bool {
        let ready = match self.effect {
            None | Some(Effect::Unassigned(_)) => return false,
            Some(Effect::Direct) => {
                self.store_direct(pool.samples_mut(), left, right);
                true
            }
            Some(Effect::Echo) => {
                self.store_tapped(pool.samples_mut(), left, right, ECHO_DELAY, echo_mix);
                self.cursor > ECHO_KICKSTART_AFTER
            }
            Some(Effect::Comb) => {
                self.store_tapped(pool.samples_mut(), left, right, COMB_DELAY, comb_mix);
                self.cursor > COMB_KICKSTART_AFTER
            }
        };

        if ready && self.kickstart_pending {
            self.kickstart_pending = false;
            return true;
        }
        false
    }

    fn store_direct(&mut self, samples: &mut [u16], left: i16, right: i16) {
        samples[self.cursor] = to_dac(left);
        self.cursor += 1;
        if self.stereo {
            samples[self.cursor] = to_dac(right);
            self.cursor += 1;
        }
        self.wrap();
    }

    fn store_tapped(
        &mut self,
        samples: &mut [u16],
        left: i16,
        right: i16,
        delay: usize,
        mix: fn(i16, i16) -> i16,
    ) {
        let channels = if self.stereo { 2 } else { 1 };
        let current = self.cursor;
        let tap = (current + TOTAL_SAMPLES - delay * channels) % TOTAL_SAMPLES;

        samples[current] = left as u16;
        if self.stereo {
            samples[current + 1] = right as u16;
        }
        self.cursor += channels;

        for ch in 0..channels {
            let slot = (tap + ch) % TOTAL_SAMPLES;
            let delayed = samples[slot] as i16;
            samples[slot] = to_dac(mix(delayed, samples[current + ch] as i16));
        }
        self.wrap();
    }

    fn wrap(&mut self) {
        if self.cursor >= TOTAL_SAMPLES {
            self.cursor = 0;
        }
    }
}

impl Default for EffectsProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[inline(always)]
fn echo_mix(delayed: i16, current: i16) -> i16 {
    (delayed >> 1).wrapping_add(current)
}

#[inline(always)]
fn comb_mix(delayed: i16, current: i16) -> i16 {
    current.wrapping_sub(delayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{to_signed, SILENCE};

    fn feed(fx: &mut EffectsProcessor, pool: &mut BufferPool, sample: i16, count: usize) -> usize {
        let mut kicks = 0;
        for _ in 0..count {
            if fx.process(pool, sample, sample) {
                kicks += 1;
            }
        }
        kicks
    }

    #[test]
    fn effect_codes() {
        assert_eq!(Effect::from_code(b'0'), Some(Effect::Direct));
        assert_eq!(Effect::from_code(b'1'), Some(Effect::Echo));
        assert_eq!(Effect::from_code(b'2'), Some(Effect::Comb));
        assert_eq!(Effect::from_code(b'7'), Some(Effect::Unassigned(b'7')));
        assert_eq!(Effect::from_code(b'A'), None);
    }

    #[test]
    fn nothing_selected_is_a_no_op() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        assert!(!fx.process(&mut pool, 100, 100));
        assert_eq!(fx.cursor(), 0);
        assert!(pool.samples().iter().all(|&s| s == SILENCE));
    }

    #[test]
    fn deselect_stops_processing() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Direct, false);
        feed(&mut fx, &mut pool, 5, 3);
        fx.deselect();
        feed(&mut fx, &mut pool, 5, 3);
        assert_eq!(fx.cursor(), 3);
    }

    #[test]
    fn unassigned_code_stores_nothing() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Unassigned(b'5'), true);
        assert_eq!(feed(&mut fx, &mut pool, 1000, 2000), 0);
        assert_eq!(fx.cursor(), 0);
        assert!(pool.samples().iter().all(|&s| s == SILENCE));
    }

    #[test]
    fn direct_kickstarts_once_on_first_sample() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Direct, false);

        assert!(fx.process(&mut pool, 1, 1));
        assert_eq!(feed(&mut fx, &mut pool, 1, TOTAL_SAMPLES * 2), 0);
    }

    #[test]
    fn direct_stores_dac_format_and_wraps() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Direct, true);

        fx.process(&mut pool, -2, 3);
        assert_eq!(pool.samples()[0], to_dac(-2));
        assert_eq!(pool.samples()[1], to_dac(3));
        assert_eq!(fx.cursor(), 2);

        feed(&mut fx, &mut pool, 0, TOTAL_SAMPLES / 2 - 1);
        assert_eq!(fx.cursor(), 0);
    }

    #[test]
    fn echo_tap_halves_its_previous_value() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Echo, false);

        feed(&mut fx, &mut pool, 0, ECHO_DELAY);
        assert_eq!(fx.cursor(), ECHO_DELAY);

        // Slot 0 is the tap for the next sample.
        pool.samples_mut()[0] = 1000i16 as u16;
        fx.process(&mut pool, 0, 0);
        assert_eq!(to_signed(pool.samples()[0]), 500);

        pool.samples_mut()[1] = (-1000i16) as u16;
        fx.process(&mut pool, 0, 0);
        assert_eq!(to_signed(pool.samples()[1]), -500);
    }

    #[test]
    fn echo_adds_current_input() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Echo, false);

        fx.process(&mut pool, 400, 0);
        feed(&mut fx, &mut pool, 0, ECHO_DELAY - 1);
        fx.process(&mut pool, 50, 0);

        assert_eq!(to_signed(pool.samples()[0]), 200 + 50);
        assert_eq!(pool.samples()[ECHO_DELAY] as i16, 50);
    }

    #[test]
    fn echo_stereo_taps_each_channel() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Echo, true);

        fx.process(&mut pool, 100, -100);
        feed(&mut fx, &mut pool, 0, ECHO_DELAY - 1);
        assert_eq!(fx.cursor(), ECHO_DELAY * 2);
        fx.process(&mut pool, 0, 0);

        assert_eq!(to_signed(pool.samples()[0]), 50);
        assert_eq!(to_signed(pool.samples()[1]), -50);
    }

    #[test]
    fn echo_kickstart_waits_for_primed_tap() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Echo, false);

        assert_eq!(feed(&mut fx, &mut pool, 0, ECHO_KICKSTART_AFTER), 0);
        assert!(fx.process(&mut pool, 0, 0));
        assert_eq!(feed(&mut fx, &mut pool, 0, TOTAL_SAMPLES), 0);
    }

    #[test]
    fn comb_step_reads_positive_after_delay() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Comb, false);
        let step = 1000;

        feed(&mut fx, &mut pool, 0, 200);
        fx.process(&mut pool, step, 0);
        assert_eq!(to_signed(pool.samples()[200 - COMB_DELAY]), step);

        feed(&mut fx, &mut pool, step, COMB_DELAY);
        assert_eq!(to_signed(pool.samples()[200]), 0);
    }

    #[test]
    fn comb_kickstart_after_128_samples() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Comb, false);

        assert_eq!(feed(&mut fx, &mut pool, 0, COMB_KICKSTART_AFTER), 0);
        assert!(fx.process(&mut pool, 0, 0));
    }

    #[test]
    fn reselect_rearms_kickstart() {
        let mut pool = BufferPool::new();
        let mut fx = EffectsProcessor::new();
        fx.select(Effect::Direct, false);
        assert!(fx.process(&mut pool, 0, 0));
        fx.select(Effect::Direct, false);
        assert_eq!(fx.cursor(), 0);
        assert!(fx.process(&mut pool, 0, 0));
    }
}
