//! Command table for the link protocol.
//!
//! Each command byte maps to the length of the data phase that follows it,
//! what gets staged for the host to read during that phase, and what runs
//! once the phase completes. A zero-length command runs straight away and
//! the link goes back to waiting for a command.

use core::ops::RangeInclusive;

use crate::constants::{FILENAME_BYTES, STREAM_BLOCK_BYTES};

/// Bytes staged for the host during the data phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Response {
    /// Whatever the buffer happens to hold.
    Nothing,
    /// A single `_`.
    Sync,
    /// Version triple, loader version, media-present flag.
    Version,
    /// The latched failure pair, which is cleared.
    Failure,
    /// Recorded blocks ready for `J`.
    FullBlocks,
    /// Free playback slots left once this `D` block lands.
    FreeBlocks,
    /// One recorded block.
    RecordedBlock,
}

/// Work done once the payload has arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Action {
    None,
    Stop,
    Mount,
    Format,
    Gains,
    Headphones,
    Volume,
    MaxGain,
    BassMax,
    ConsoleTx,
    PlayFile,
    RecordFile,
    Presize,
    PlayFromLink,
    RecordToLink,
    PassThrough,
    DeliverBlock,
    Reprogram,
}

/// One row of the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub codes: RangeInclusive<u8>,
    /// Data-phase length: the larger of payload and staged response.
    pub exchange_len: usize,
    pub response: Response,
    pub action: Action,
}

const fn cmd(code: u8, exchange_len: usize, response: Response, action: Action) -> Command {
    Command {
        codes: RangeInclusive::new(code, code),
        exchange_len,
        response,
        action,
    }
}

/// rate u16 + stereo u8
const LINK_PLAY_PARAMS: usize = 3;
/// rate u16 + stereo u8 + source u8
const CAPTURE_PARAMS: usize = 4;

pub const COMMANDS: &[Command] = &[
    cmd(b'?', 0, Response::Nothing, Action::None),
    cmd(b'*', 1, Response::Sync, Action::None),
    cmd(b'Z', 7, Response::Version, Action::None),
    cmd(b'E', 2, Response::Failure, Action::None),
    cmd(b'K', 1, Response::FullBlocks, Action::None),
    cmd(b'J', STREAM_BLOCK_BYTES, Response::RecordedBlock, Action::None),
    cmd(b'D', STREAM_BLOCK_BYTES, Response::FreeBlocks, Action::DeliverBlock),
    cmd(b'Q', 0, Response::Nothing, Action::Stop),
    cmd(b'H', 1, Response::Nothing, Action::Headphones),
    cmd(b'V', 1, Response::Nothing, Action::Volume),
    cmd(b'G', 1, Response::Nothing, Action::MaxGain),
    cmd(b'B', 1, Response::Nothing, Action::BassMax),
    cmd(b'T', 1, Response::Nothing, Action::ConsoleTx),
    cmd(b'F', 1, Response::Nothing, Action::Mount),
    cmd(b'@', 4, Response::Nothing, Action::Format),
    cmd(b'A', 2, Response::Nothing, Action::Gains),
    cmd(b'P', FILENAME_BYTES, Response::Nothing, Action::PlayFile),
    cmd(b'R', CAPTURE_PARAMS + FILENAME_BYTES, Response::Nothing, Action::RecordFile),
    cmd(b'S', 2 + FILENAME_BYTES, Response::Nothing, Action::Presize),
    cmd(b'C', LINK_PLAY_PARAMS, Response::Nothing, Action::PlayFromLink),
    cmd(b'I', CAPTURE_PARAMS, Response::Nothing, Action::RecordToLink),
    Command {
        codes: RangeInclusive::new(b'0', b'9'),
        exchange_len: CAPTURE_PARAMS,
        response: Response::Nothing,
        action: Action::PassThrough,
    },
    cmd(b'!', FILENAME_BYTES, Response::Nothing, Action::Reprogram),
];

/// Table row for `code`, `None` for unknown commands.
pub fn lookup(code: u8) -> Option<&'static Command> {
    COMMANDS.iter().find(|c| c.codes.contains(&code))
}

/// Little-endian field reader over a received payload.
///
/// Reads past the end yield zeros; the table guarantees every payload is
/// long enough.
pub struct Payload<'p> {
    bytes: &'p [u8],
    pos: usize,
}

impl<'p> Payload<'p> {
    pub fn new(bytes: &'p [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn u8(&mut self) -> u8 {
        let value = self.bytes.get(self.pos).copied().unwrap_or(0);
        self.pos += 1;
        value
    }

    pub fn u16(&mut self) -> u16 {
        u16::from_le_bytes([self.u8(), self.u8()])
    }

    pub fn u32(&mut self) -> u32 {
        u32::from_le_bytes([self.u8(), self.u8(), self.u8(), self.u8()])
    }

    /// A NUL-padded filename field.
    pub fn filename(&mut self) -> [u8; FILENAME_BYTES] {
        let mut field = [0u8; FILENAME_BYTES];
        for b in field.iter_mut() {
            *b = self.u8();
        }
        field
    }
}
