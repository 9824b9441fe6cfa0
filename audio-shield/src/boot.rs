//! Hand-off to the reprogramming agent.
//!
//! The agent reads a 16-byte command area left behind by the application:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 1 | command (1 = program from file) |
//! | 1 | 13 | NUL-padded 8.3 filename |
//! | 14 | 2 | CRC-16 over bytes 0..14, little-endian |
//!
//! The CRC is the reflected CCITT polynomial (0x8408) seeded with 0xFFFF
//! and no final XOR.

use crate::constants::FILENAME_BYTES;

/// Size of the command area.
pub const BOOT_COMMAND_BYTES: usize = 16;

const CRC_COVERED: usize = 1 + FILENAME_BYTES;

/// Command codes understood by the reprogramming agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum BootAction {
    ProgramFromFile = 1,
}

/// A sealed command area, ready to hand over.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootCommand {
    bytes: [u8; BOOT_COMMAND_BYTES],
}

impl BootCommand {
    /// Ask the agent to reprogram from `filename` (NUL-padded, as sent by the host).
    pub fn program_from_file(filename: &[u8; FILENAME_BYTES]) -> Self {
        let mut bytes = [0u8; BOOT_COMMAND_BYTES];
        bytes[0] = BootAction::ProgramFromFile as u8;
        bytes[1..CRC_COVERED].copy_from_slice(filename);
        let crc = crc16_ccitt(&bytes[..CRC_COVERED]);
        bytes[CRC_COVERED..].copy_from_slice(&crc.to_le_bytes());
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; BOOT_COMMAND_BYTES] {
        &self.bytes
    }

    pub fn action(&self) -> u8 {
        self.bytes[0]
    }

    pub fn crc(&self) -> u16 {
        u16::from_le_bytes([self.bytes[CRC_COVERED], self.bytes[CRC_COVERED + 1]])
    }
}

/// One step of the reflected CCITT CRC.
#[inline]
pub fn crc_ccitt_update(crc: u16, byte: u8) -> u16 {
    let mut data = byte ^ (crc as u8);
    data ^= data << 4;
    let data = u16::from(data);
    ((data << 8) | (crc >> 8)) ^ (data >> 4) ^ (data << 3)
}

/// CRC-16 over `bytes`, seeded with 0xFFFF.
pub fn crc16_ccitt(bytes: &[u8]) -> u16 {
    bytes.iter().fold(0xFFFF, |crc, &b| crc_ccitt_update(crc, b))
}
