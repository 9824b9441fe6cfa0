//! Hardware collaborators.
//!
//! The engine never touches registers. Each peripheral it drives is a trait
//! here, and a [`Board`] names the concrete type of each one. Peripheral
//! bring-up (clock sources, converter calibration, pin muxing) happens in the
//! application before the [`Peripherals`] are handed to the engine.

use crate::boot::BootCommand;
use crate::buffer::Half;
use crate::control::OutputControl;
use crate::storage::FileSystem;

// ── Converter ──────────────────────────────────────────────────────────────

/// Analog input feeding the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InputSource {
    Line,
    Mic,
}

impl InputSource {
    /// Link encoding: zero selects line-in, anything else the microphone.
    pub fn from_code(code: u8) -> Self {
        if code == 0 {
            InputSource::Line
        } else {
            InputSource::Mic
        }
    }
}

/// Converter front-end gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Gain {
    X1 = 0,
    X2 = 1,
    X4 = 2,
    X8 = 3,
}

impl Gain {
    /// Link encoding, low two bits only.
    pub fn from_code(code: u8) -> Self {
        match code & 0b11 {
            0 => Gain::X1,
            1 => Gain::X2,
            2 => Gain::X4,
            _ => Gain::X8,
        }
    }
}

/// Gain applied to each input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Gains {
    pub line: Gain,
    pub mic: Gain,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            line: Gain::X1,
            mic: Gain::X1,
        }
    }
}

/// Analog-to-digital converter, triggered once per sample period by the
/// [`RateClock`].
pub trait Converter {
    fn set_gains(&mut self, gains: Gains);

    /// Start converting `source` on every rate clock tick.
    fn start(&mut self, source: InputSource);

    fn stop(&mut self);

    /// Latest (left, right) result. Called from the conversion-complete handler.
    fn read_pair(&mut self) -> (i16, i16);
}

/// Timer that paces conversions and transfers at the sample rate.
pub trait RateClock {
    fn start(&mut self, rate_hz: u16);

    fn stop(&mut self);
}

// ── Transfer channels ──────────────────────────────────────────────────────

/// Which way samples move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Converter result register into memory.
    Capture,
    /// Memory into the DAC data register.
    Playback,
}

/// Bytes moved per rate clock tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Burst {
    /// One 16-bit sample (mono).
    TwoByte,
    /// Two 16-bit samples (stereo).
    FourByte,
}

impl Burst {
    pub fn for_channels(stereo: bool) -> Self {
        if stereo {
            Burst::FourByte
        } else {
            Burst::TwoByte
        }
    }
}

/// Programming for the two ping-pong channels.
///
/// Channel `n` moves [`half_bytes`](Self::half_bytes) to or from
/// `half_addresses[n]`, repeating forever and reloading its address at each
/// block end. Finishing a block enables the other channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    pub direction: Direction,
    pub burst: Burst,
    pub half_addresses: [usize; 2],
    pub half_bytes: u16,
}

/// The two chained DMA-style channels.
pub trait DmaChannels {
    /// Program both channels; neither is enabled afterwards.
    fn configure(&mut self, config: &ChannelConfig);

    /// Enable one channel. The chain takes over from there.
    fn enable(&mut self, half: Half);

    /// Request both channels off without waiting.
    fn disable(&mut self);

    /// Whether the controller or either channel still reports busy.
    fn is_enabled(&self) -> bool;

    /// Force both channels into the disabled reset state.
    fn reset(&mut self);
}

// ── Link, console, loader ──────────────────────────────────────────────────

/// Host link in byte-synchronous slave mode.
pub trait LinkPort {
    /// Load the byte the host will read on its next clock.
    fn preload(&mut self, byte: u8);
}

/// Debug text console.
pub trait Console {
    fn set_tx_enabled(&mut self, enabled: bool);
}

/// The separate agent that rewrites application flash.
pub trait Reprogrammer {
    fn loader_version(&self) -> u16;

    /// Leave `command` where the agent finds it and transfer control.
    fn reprogram(&mut self, command: &BootCommand) -> !;
}

// ── Board ──────────────────────────────────────────────────────────────────

/// Names the concrete peripheral types of one board.
pub trait Board {
    type Converter: Converter;
    type Clock: RateClock;
    type Dma: DmaChannels;
    type Link: LinkPort;
    type Storage: FileSystem;
    type Output: OutputControl;
    type Console: Console;
    type Loader: Reprogrammer;
}

/// The peripherals only the main loop drives.
///
/// The converter and the transfer channels are also touched from interrupt
/// context, so they are handed to [`Shared::new`](crate::session::Shared::new)
/// instead.
pub struct Peripherals<B: Board> {
    pub clock: B::Clock,
    pub link: B::Link,
    pub storage: B::Storage,
    pub output: B::Output,
    pub console: B::Console,
    pub loader: B::Loader,
}
