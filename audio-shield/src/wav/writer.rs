use crate::constants::PRESIZE_UNIT_BYTES;
use crate::fail::{FailMajor, FailMinor, FailureCode};
use crate::storage::{FileSystem, OpenMode};

use super::{encode_header, WavInfo, HEADER_BYTES};

/// A WAV file being recorded. The header is written by
/// [`finalize`](Self::finalize) once the data length is known.
pub struct WavWriter<F: FileSystem> {
    file: F::File,
    info: WavInfo,
}

impl<F: FileSystem> WavWriter<F> {
    /// Create (or replace) `name` and position it after the header.
    pub fn create(fs: &mut F, name: &str, stereo: bool, sample_rate: u16) -> Result<Self, FailureCode> {
        let error = |minor| FailureCode::new(FailMajor::WavCreate, minor);
        let mut file = fs
            .open(name, OpenMode::CreateAlways)
            .map_err(|_| error(FailMinor::NoFile))?;
        if fs.seek(&mut file, HEADER_BYTES as u32).is_err() {
            let _ = fs.close(file);
            return Err(error(FailMinor::Seek));
        }
        Ok(Self {
            file,
            info: WavInfo::pcm16(stereo, u32::from(sample_rate)),
        })
    }

    pub fn info(&self) -> &WavInfo {
        &self.info
    }

    /// Append sample bytes. Anything short of a full write is a failure.
    pub fn write(&mut self, fs: &mut F, bytes: &[u8]) -> Result<(), FailureCode> {
        match fs.write(&mut self.file, bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            _ => Err(FailureCode::new(FailMajor::Record, FailMinor::BufferWrite)),
        }
    }

    /// Cut the file after the last sample, write the header and close.
    /// Returns the data chunk size. The file is closed on every path.
    pub fn finalize(mut self, fs: &mut F) -> Result<u32, FailureCode> {
        let result = self.write_header(fs);
        let _ = fs.close(self.file);
        result
    }

    fn write_header(&mut self, fs: &mut F) -> Result<u32, FailureCode> {
        let error = |minor| FailureCode::new(FailMajor::WavFinalize, minor);
        let data_bytes = fs.tell(&self.file).saturating_sub(HEADER_BYTES as u32);

        fs.truncate(&mut self.file)
            .map_err(|_| error(FailMinor::Truncate))?;
        fs.seek(&mut self.file, 0)
            .map_err(|_| error(FailMinor::Seek))?;

        let header = encode_header(&self.info, data_bytes);
        match fs.write(&mut self.file, &header) {
            Ok(n) if n == HEADER_BYTES => Ok(data_bytes),
            _ => Err(error(FailMinor::NoHeader)),
        }
    }
}

/// Reserve `megabytes` of space for `name` ahead of a recording.
pub fn presize<F: FileSystem>(fs: &mut F, name: &str, megabytes: u16) -> Result<(), FailureCode> {
    let error = |minor| FailureCode::new(FailMajor::Presize, minor);
    let size = u32::from(megabytes)
        .checked_mul(PRESIZE_UNIT_BYTES)
        .ok_or(error(FailMinor::Seek))?;
    let mut file = fs
        .open(name, OpenMode::CreateAlways)
        .map_err(|_| error(FailMinor::NoFile))?;
    let seeked = fs.seek(&mut file, size);
    let _ = fs.close(file);
    seeked.map_err(|_| error(FailMinor::Seek))
}
