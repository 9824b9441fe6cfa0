//! Device failure codes.
//!
//! Every error the firmware can report to the host is a `(major, minor)`
//! pair. The major code names the operation that failed, the minor code
//! the reason. The most recent pair sits in a [`FailureLatch`] until the
//! host reads it back with `E`, which also clears it.
//!
//! Wire values are fixed: hosts decode them as raw bytes.

use core::cell::Cell;

use critical_section::Mutex;

/// Operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FailMajor {
    NoFailure = 0,
    WavOpen = 1,
    WavRead = 2,
    WavCreate = 3,
    WavFinalize = 4,
    Record = 5,
    Mount = 6,
    Format = 7,
    Presize = 8,
    /// Volume-control bus transaction.
    Output = 9,
    /// Transfer channels never reported disabled.
    Transfer = 10,
}

/// Reason for the failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum FailMinor {
    None = 0,
    NoFile = 1,
    NoHeader = 2,
    NoRiff = 3,
    NoWave = 4,
    NoFmt = 5,
    BadFmt = 6,
    NotPcm = 7,
    NoData = 8,
    BadData = 9,
    Seek = 10,
    BufferWrite = 11,
    NoInit = 12,
    NoMount = 13,
    MountSuccess = 14,
    FormatFailed = 15,
    BadCode = 16,
    Truncate = 17,
    Bus = 18,
    SettleTimeout = 19,
}

/// A `(major, minor)` failure pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FailureCode {
    pub major: FailMajor,
    pub minor: FailMinor,
}

impl FailureCode {
    /// The cleared state.
    pub const NONE: Self = Self::new(FailMajor::NoFailure, FailMinor::None);

    pub const fn new(major: FailMajor, minor: FailMinor) -> Self {
        Self { major, minor }
    }

    /// Bytes as staged for the `E` response.
    pub const fn to_bytes(self) -> [u8; 2] {
        [self.major as u8, self.minor as u8]
    }

    pub fn is_failure(&self) -> bool {
        self.major != FailMajor::NoFailure
    }
}

impl Default for FailureCode {
    fn default() -> Self {
        Self::NONE
    }
}

impl core::fmt::Display for FailMajor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            FailMajor::NoFailure => "no failure",
            FailMajor::WavOpen => "WAV open",
            FailMajor::WavRead => "WAV read",
            FailMajor::WavCreate => "WAV create",
            FailMajor::WavFinalize => "WAV finalize",
            FailMajor::Record => "record",
            FailMajor::Mount => "mount",
            FailMajor::Format => "format",
            FailMajor::Presize => "presize",
            FailMajor::Output => "output control",
            FailMajor::Transfer => "transfer",
        };
        f.write_str(name)
    }
}

impl core::fmt::Display for FailMinor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let name = match self {
            FailMinor::None => "none",
            FailMinor::NoFile => "no file",
            FailMinor::NoHeader => "no header",
            FailMinor::NoRiff => "missing RIFF tag",
            FailMinor::NoWave => "missing WAVE tag",
            FailMinor::NoFmt => "missing fmt chunk",
            FailMinor::BadFmt => "bad fmt chunk",
            FailMinor::NotPcm => "not PCM",
            FailMinor::NoData => "missing data chunk",
            FailMinor::BadData => "bad data chunk",
            FailMinor::Seek => "seek",
            FailMinor::BufferWrite => "buffer write",
            FailMinor::NoInit => "disk init",
            FailMinor::NoMount => "no mount",
            FailMinor::MountSuccess => "mounted",
            FailMinor::FormatFailed => "format failed",
            FailMinor::BadCode => "bad confirmation code",
            FailMinor::Truncate => "truncate",
            FailMinor::Bus => "bus error",
            FailMinor::SettleTimeout => "settle timeout",
        };
        f.write_str(name)
    }
}

impl core::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} failure: {}", self.major, self.minor)
    }
}

/// Holds the most recent unacknowledged failure.
///
/// Both the main loop and interrupt handlers may record into the latch, so
/// every access goes through a critical section.
pub struct FailureLatch {
    code: Mutex<Cell<FailureCode>>,
}

impl FailureLatch {
    pub const fn new() -> Self {
        Self {
            code: Mutex::new(Cell::new(FailureCode::NONE)),
        }
    }

    /// Record a full pair.
    pub fn set(&self, code: FailureCode) {
        #[cfg(feature = "defmt")]
        if code.is_failure() {
            defmt::warn!("failure recorded: {}", code);
        }
        critical_section::with(|cs| self.code.borrow(cs).set(code));
    }

    /// Record the operation being attempted, with no reason yet.
    pub fn begin(&self, major: FailMajor) {
        self.set(FailureCode::new(major, FailMinor::None));
    }

    /// Clear to "no failure" after a successful operation.
    pub fn clear(&self) {
        self.set(FailureCode::NONE);
    }

    pub fn get(&self) -> FailureCode {
        critical_section::with(|cs| self.code.borrow(cs).get())
    }

    /// Report and clear in one step, as the `E` command does.
    pub fn take(&self) -> FailureCode {
        critical_section::with(|cs| self.code.borrow(cs).replace(FailureCode::NONE))
    }
}

impl Default for FailureLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values_are_stable() {
        let code = FailureCode::new(FailMajor::Record, FailMinor::BufferWrite);
        assert_eq!(code.to_bytes(), [5, 11]);
        assert_eq!(FailureCode::new(FailMajor::Format, FailMinor::BadCode).to_bytes(), [7, 16]);
        assert_eq!(FailureCode::new(FailMajor::WavFinalize, FailMinor::Truncate).to_bytes(), [4, 17]);
        assert_eq!(FailureCode::NONE.to_bytes(), [0, 0]);
    }

    #[test]
    fn take_reports_then_clears() {
        let latch = FailureLatch::new();
        latch.set(FailureCode::new(FailMajor::Mount, FailMinor::NoMount));

        assert_eq!(latch.take(), FailureCode::new(FailMajor::Mount, FailMinor::NoMount));
        assert_eq!(latch.get(), FailureCode::NONE);
        assert!(!latch.take().is_failure());
    }

    #[test]
    fn begin_records_major_with_empty_minor() {
        let latch = FailureLatch::new();
        latch.set(FailureCode::new(FailMajor::Mount, FailMinor::NoInit));
        latch.begin(FailMajor::WavOpen);
        assert_eq!(latch.get(), FailureCode::new(FailMajor::WavOpen, FailMinor::None));
        assert!(latch.get().is_failure());
    }
}
