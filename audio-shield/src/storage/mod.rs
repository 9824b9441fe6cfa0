//! Storage collaborator interface.
//!
//! The block driver and file-system layer live outside this crate. The
//! engine drives one file at a time through [`FileSystem`], whose
//! operations report a small [`FsError`] result code.

use heapless::String;

use crate::constants::FILENAME_MAX_CHARS;

/// Result codes reported by the file-system layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FsError {
    /// Low-level disk I/O failed.
    Disk,
    /// The medium is absent or was never initialized.
    NotReady,
    NoFile,
    NoPath,
    InvalidName,
    Denied,
    WriteProtected,
    /// No valid file system on the medium.
    NoFilesystem,
    /// Any internal consistency failure in the file-system layer.
    Internal,
}

impl core::fmt::Display for FsError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            FsError::Disk => "disk error",
            FsError::NotReady => "not ready",
            FsError::NoFile => "no such file",
            FsError::NoPath => "no such path",
            FsError::InvalidName => "invalid name",
            FsError::Denied => "access denied",
            FsError::WriteProtected => "write protected",
            FsError::NoFilesystem => "no file system",
            FsError::Internal => "internal error",
        };
        f.write_str(name)
    }
}

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OpenMode {
    /// Existing file, read only.
    Read,
    /// Create or truncate, write only.
    CreateAlways,
}

/// File system on a removable medium.
pub trait FileSystem {
    /// Handle to one open file.
    type File;

    /// Bring up the medium at the slowest bus speed.
    fn initialize(&mut self) -> Result<(), FsError>;

    /// Mount the file system on an initialized medium.
    fn mount(&mut self) -> Result<(), FsError>;

    /// Switch the medium's bus clock once mounted.
    fn set_bus_speed(&mut self, speed: u8);

    /// Create a fresh file system, destroying the medium's contents.
    fn make_filesystem(&mut self) -> Result<(), FsError>;

    /// Whether a medium is physically present.
    fn media_present(&self) -> bool;

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<Self::File, FsError>;

    /// Read into `buf`; returns bytes read, short only at end of file.
    fn read(&mut self, file: &mut Self::File, buf: &mut [u8]) -> Result<usize, FsError>;

    /// Write `buf`; returns bytes written, short when the medium is full.
    fn write(&mut self, file: &mut Self::File, buf: &[u8]) -> Result<usize, FsError>;

    /// Move to an absolute position, extending the file if needed.
    fn seek(&mut self, file: &mut Self::File, position: u32) -> Result<(), FsError>;

    fn tell(&self, file: &Self::File) -> u32;

    /// Cut the file at the current position.
    fn truncate(&mut self, file: &mut Self::File) -> Result<(), FsError>;

    fn close(&mut self, file: Self::File) -> Result<(), FsError>;
}

/// An 8.3 filename decoded from a NUL-padded link field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileName(String<FILENAME_MAX_CHARS>);

impl FileName {
    /// Decode up to the first NUL. Names that are empty or longer than
    /// twelve bytes are rejected, as are non-UTF-8 bytes.
    pub fn from_padded(field: &[u8]) -> Option<Self> {
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if len == 0 || len > FILENAME_MAX_CHARS {
            return None;
        }
        let text = core::str::from_utf8(&field[..len]).ok()?;
        let mut name = String::new();
        name.push_str(text).ok()?;
        Some(Self(name))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FileName {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", self.as_str())
    }
}
