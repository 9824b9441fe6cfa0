//! WAV container reading and writing.
//!
//! Only the canonical 44-byte PCM layout is produced, and only 16-bit PCM
//! with one or two channels is accepted on read:
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0 | 4 | `RIFF` |
//! | 4 | 4 | file size − 8 |
//! | 8 | 4 | `WAVE` |
//! | 12 | 4 | `fmt ` |
//! | 16 | 4 | format chunk size (≥ 16) |
//! | 20 | 2 | format code (1 = PCM) |
//! | 22 | 2 | channels |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | byte rate |
//! | 32 | 2 | block align |
//! | 34 | 2 | bits per sample |
//! | 36 | 4 | `data` |
//! | 40 | 4 | data size |
//!
//! Samples follow as interleaved little-endian `i16`.

mod reader;
mod writer;

pub use reader::WavReader;
pub use writer::{presize, WavWriter};

/// Size of the canonical header.
pub const HEADER_BYTES: usize = 44;

/// Format code for uncompressed PCM.
pub const FORMAT_PCM: u16 = 1;

const FMT_CHUNK_BYTES: u32 = 16;

/// The `fmt ` chunk fields after the format code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WavInfo {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
}

impl WavInfo {
    /// 16-bit PCM at `sample_rate`.
    pub fn pcm16(stereo: bool, sample_rate: u32) -> Self {
        let channels: u16 = if stereo { 2 } else { 1 };
        Self {
            channels,
            sample_rate,
            byte_rate: sample_rate * u32::from(channels) * 2,
            block_align: channels * 2,
            bits_per_sample: 16,
        }
    }

    pub fn is_stereo(&self) -> bool {
        self.channels == 2
    }

    /// Parse the 14 bytes that follow the format code.
    fn from_fmt_bytes(b: &[u8; 14]) -> Self {
        Self {
            channels: u16::from_le_bytes([b[0], b[1]]),
            sample_rate: u32::from_le_bytes([b[2], b[3], b[4], b[5]]),
            byte_rate: u32::from_le_bytes([b[6], b[7], b[8], b[9]]),
            block_align: u16::from_le_bytes([b[10], b[11]]),
            bits_per_sample: u16::from_le_bytes([b[12], b[13]]),
        }
    }
}

/// Build the canonical header for `data_bytes` of samples.
pub fn encode_header(info: &WavInfo, data_bytes: u32) -> [u8; HEADER_BYTES] {
    let mut h = [0u8; HEADER_BYTES];
    h[0..4].copy_from_slice(b"RIFF");
    h[4..8].copy_from_slice(&(data_bytes + (HEADER_BYTES as u32 - 8)).to_le_bytes());
    h[8..12].copy_from_slice(b"WAVE");
    h[12..16].copy_from_slice(b"fmt ");
    h[16..20].copy_from_slice(&FMT_CHUNK_BYTES.to_le_bytes());
    h[20..22].copy_from_slice(&FORMAT_PCM.to_le_bytes());
    h[22..24].copy_from_slice(&info.channels.to_le_bytes());
    h[24..28].copy_from_slice(&info.sample_rate.to_le_bytes());
    h[28..32].copy_from_slice(&info.byte_rate.to_le_bytes());
    h[32..34].copy_from_slice(&info.block_align.to_le_bytes());
    h[34..36].copy_from_slice(&info.bits_per_sample.to_le_bytes());
    h[36..40].copy_from_slice(b"data");
    h[40..44].copy_from_slice(&data_bytes.to_le_bytes());
    h
}
