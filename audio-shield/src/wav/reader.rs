use crate::fail::{FailMajor, FailMinor, FailureCode};
use crate::storage::{FileSystem, OpenMode};

use super::{WavInfo, FMT_CHUNK_BYTES, FORMAT_PCM};

/// Bytes up to and including the basic `fmt ` chunk.
const RIFF_FMT_BYTES: usize = 36;

/// Chunk tag plus size.
const CHUNK_HEADER_BYTES: usize = 8;

fn open_error(minor: FailMinor) -> FailureCode {
    FailureCode::new(FailMajor::WavOpen, minor)
}

/// An open WAV file positioned in its sample data.
pub struct WavReader<F: FileSystem> {
    file: F::File,
    info: WavInfo,
    remaining: u32,
}

impl<F: FileSystem> WavReader<F> {
    /// Open `name` and walk its header up to the first sample.
    pub fn open(fs: &mut F, name: &str) -> Result<Self, FailureCode> {
        let mut file = fs
            .open(name, OpenMode::Read)
            .map_err(|_| open_error(FailMinor::NoFile))?;

        match Self::read_header(fs, &mut file) {
            Ok((info, remaining)) => Ok(Self {
                file,
                info,
                remaining,
            }),
            Err(code) => {
                let _ = fs.close(file);
                Err(code)
            }
        }
    }

    fn read_header(fs: &mut F, file: &mut F::File) -> Result<(WavInfo, u32), FailureCode> {
        let mut header = [0u8; RIFF_FMT_BYTES];
        match fs.read(file, &mut header) {
            Ok(n) if n == RIFF_FMT_BYTES => {}
            _ => return Err(open_error(FailMinor::NoHeader)),
        }

        if &header[0..4] != b"RIFF" {
            return Err(open_error(FailMinor::NoRiff));
        }
        if &header[8..12] != b"WAVE" {
            return Err(open_error(FailMinor::NoWave));
        }
        if &header[12..16] != b"fmt " {
            return Err(open_error(FailMinor::NoFmt));
        }
        let fmt_bytes = u32::from_le_bytes([header[16], header[17], header[18], header[19]]);
        if fmt_bytes < FMT_CHUNK_BYTES {
            return Err(open_error(FailMinor::BadFmt));
        }
        if u16::from_le_bytes([header[20], header[21]]) != FORMAT_PCM {
            return Err(open_error(FailMinor::NotPcm));
        }

        let mut fields = [0u8; 14];
        fields.copy_from_slice(&header[22..36]);
        let info = WavInfo::from_fmt_bytes(&fields);
        let playable = matches!(info.channels, 1 | 2)
            && info.bits_per_sample == 16
            && (1..=u32::from(u16::MAX)).contains(&info.sample_rate);
        if !playable {
            return Err(open_error(FailMinor::BadFmt));
        }

        if fmt_bytes > FMT_CHUNK_BYTES {
            let skip_to = fs.tell(file) + (fmt_bytes - FMT_CHUNK_BYTES);
            fs.seek(file, skip_to)
                .map_err(|_| open_error(FailMinor::Seek))?;
        }

        let mut chunk = [0u8; CHUNK_HEADER_BYTES];
        match fs.read(file, &mut chunk) {
            Ok(n) if n == CHUNK_HEADER_BYTES => {}
            _ => return Err(open_error(FailMinor::NoData)),
        }
        if &chunk[0..4] != b"data" {
            return Err(open_error(FailMinor::BadData));
        }
        let data_bytes = u32::from_le_bytes([chunk[4], chunk[5], chunk[6], chunk[7]]);

        Ok((info, data_bytes))
    }

    pub fn info(&self) -> &WavInfo {
        &self.info
    }

    /// Sample bytes not yet read.
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    /// Read up to `buf.len()` sample bytes. Returns fewer only at the end of
    /// the data chunk; a file shorter than its header claims is an error.
    pub fn fill(&mut self, fs: &mut F, buf: &mut [u8]) -> Result<usize, FailureCode> {
        let wanted = buf.len().min(self.remaining as usize);
        let read_error = FailureCode::new(FailMajor::WavRead, FailMinor::None);
        let n = fs
            .read(&mut self.file, &mut buf[..wanted])
            .map_err(|_| read_error)?;
        if n != wanted {
            return Err(read_error);
        }
        self.remaining -= n as u32;
        Ok(n)
    }

    pub fn close(self, fs: &mut F) {
        let _ = fs.close(self.file);
    }
}
