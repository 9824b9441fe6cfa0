//! Host-side stand-ins for every board peripheral, shared by unit and
//! integration tests.

use core::cell::Cell;

use heapless::String;

use crate::boot::BootCommand;
use crate::buffer::Half;
use crate::control::OutputControl;
use crate::hal::{
    Board, ChannelConfig, Console, Converter, DmaChannels, Gains, InputSource, LinkPort,
    Peripherals, RateClock, Reprogrammer,
};
use crate::session::Shared;
use crate::storage::{FileSystem, FsError, OpenMode};

// ── Converter / clock ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockConverter {
    pub gains: Gains,
    pub source: Option<InputSource>,
    pub running: bool,
    pub next: (i16, i16),
}

impl Converter for MockConverter {
    fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
    }

    fn start(&mut self, source: InputSource) {
        self.source = Some(source);
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn read_pair(&mut self) -> (i16, i16) {
        self.next
    }
}

#[derive(Default)]
pub struct MockClock {
    pub rate: Option<u16>,
    pub starts: u32,
}

impl RateClock for MockClock {
    fn start(&mut self, rate_hz: u16) {
        self.rate = Some(rate_hz);
        self.starts += 1;
    }

    fn stop(&mut self) {
        self.rate = None;
    }
}

// ── Transfer channels ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct MockDma {
    pub config: Option<ChannelConfig>,
    pub enabled: [bool; 2],
    /// Channel enables in order.
    pub enable_log: [Option<Half>; 8],
    pub enable_count: usize,
    pub disables: u32,
    pub resets: u32,
    /// Ignore `disable()`, as a wedged controller would.
    pub stuck: bool,
    /// `is_enabled()` calls so far.
    pub polls: Cell<u32>,
}

impl MockDma {
    pub fn running(&self) -> bool {
        self.enabled[0] || self.enabled[1]
    }
}

impl DmaChannels for MockDma {
    fn configure(&mut self, config: &ChannelConfig) {
        self.config = Some(*config);
    }

    fn enable(&mut self, half: Half) {
        self.enabled[half.index()] = true;
        if self.enable_count < self.enable_log.len() {
            self.enable_log[self.enable_count] = Some(half);
        }
        self.enable_count += 1;
    }

    fn disable(&mut self) {
        self.disables += 1;
        if !self.stuck {
            self.enabled = [false; 2];
        }
    }

    fn is_enabled(&self) -> bool {
        self.polls.set(self.polls.get() + 1);
        self.running()
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.enabled = [false; 2];
    }
}

// ── Link, console, loader ──────────────────────────────────────────────────

#[derive(Default)]
pub struct MockLink {
    pub preloaded: Option<u8>,
}

impl LinkPort for MockLink {
    fn preload(&mut self, byte: u8) {
        self.preloaded = Some(byte);
    }
}

#[derive(Default)]
pub struct MockConsole {
    pub tx_enabled: bool,
}

impl Console for MockConsole {
    fn set_tx_enabled(&mut self, enabled: bool) {
        self.tx_enabled = enabled;
    }
}

pub struct MockLoader;

impl MockLoader {
    pub const VERSION: u16 = 0x0103;
}

impl Reprogrammer for MockLoader {
    fn loader_version(&self) -> u16 {
        Self::VERSION
    }

    fn reprogram(&mut self, command: &BootCommand) -> ! {
        panic!("reprogram crc={:04x}", command.crc());
    }
}

// ── Output control ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct MockOutputError;

pub struct MockOutput {
    pub enabled: bool,
    pub volume: u8,
    pub max_gain: bool,
    pub bass_max: bool,
    pub fail: bool,
}

impl Default for MockOutput {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0x1F,
            max_gain: true,
            bass_max: true,
            fail: false,
        }
    }
}

impl MockOutput {
    fn check(&self) -> Result<(), MockOutputError> {
        if self.fail {
            Err(MockOutputError)
        } else {
            Ok(())
        }
    }
}

impl OutputControl for MockOutput {
    type Error = MockOutputError;

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.check()?;
        self.enabled = false;
        Ok(())
    }

    fn volume(&mut self, level: u8) -> Result<(), Self::Error> {
        self.check()?;
        self.volume = level & 0x1F;
        Ok(())
    }

    fn max_gain(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.check()?;
        self.max_gain = enabled;
        Ok(())
    }

    fn bass_max(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.check()?;
        self.bass_max = enabled;
        Ok(())
    }
}

// ── Storage ────────────────────────────────────────────────────────────────

pub const MOCK_FILE_CAPACITY: usize = 8192;

/// A medium holding at most one file.
pub struct MockFs {
    pub name: String<12>,
    pub data: [u8; MOCK_FILE_CAPACITY],
    /// Logical length; may exceed the backing array after presizing.
    pub len: u32,
    pub exists: bool,
    pub open_handles: u32,
    /// Handles opened for reading and not yet closed.
    pub open_readers: u32,
    pub present: bool,
    pub mounted: bool,
    pub bus_speed: Option<u8>,
    pub init_error: Option<FsError>,
    pub mount_error: Option<FsError>,
    pub mkfs_error: Option<FsError>,
    pub mkfs_calls: u32,
    /// Successful `write` calls before every further write comes up short.
    pub writes_before_short: Option<u32>,
    pub write_calls: u32,
    pub truncated: bool,
}

pub struct MockFile {
    pub pos: u32,
    pub mode: OpenMode,
}

impl Default for MockFs {
    fn default() -> Self {
        Self {
            name: String::new(),
            data: [0; MOCK_FILE_CAPACITY],
            len: 0,
            exists: false,
            open_handles: 0,
            open_readers: 0,
            present: true,
            mounted: false,
            bus_speed: None,
            init_error: None,
            mount_error: None,
            mkfs_error: None,
            mkfs_calls: 0,
            writes_before_short: None,
            write_calls: 0,
            truncated: false,
        }
    }
}

impl MockFs {
    /// Store `bytes` as file `name`.
    pub fn with_file(name: &str, bytes: &[u8]) -> Self {
        let mut fs = Self::default();
        let _ = fs.name.push_str(name);
        fs.data[..bytes.len()].copy_from_slice(bytes);
        fs.len = bytes.len() as u32;
        fs.exists = true;
        fs
    }

    pub fn contents(&self) -> &[u8] {
        let len = (self.len as usize).min(MOCK_FILE_CAPACITY);
        &self.data[..len]
    }
}

impl FileSystem for MockFs {
    type File = MockFile;

    fn initialize(&mut self) -> Result<(), FsError> {
        match self.init_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn mount(&mut self) -> Result<(), FsError> {
        match self.mount_error {
            Some(e) => Err(e),
            None => {
                self.mounted = true;
                Ok(())
            }
        }
    }

    fn set_bus_speed(&mut self, speed: u8) {
        self.bus_speed = Some(speed);
    }

    fn make_filesystem(&mut self) -> Result<(), FsError> {
        self.mkfs_calls += 1;
        match self.mkfs_error {
            Some(e) => Err(e),
            None => {
                self.exists = false;
                self.len = 0;
                Ok(())
            }
        }
    }

    fn media_present(&self) -> bool {
        self.present
    }

    fn open(&mut self, name: &str, mode: OpenMode) -> Result<MockFile, FsError> {
        match mode {
            OpenMode::Read => {
                if !self.exists || self.name.as_str() != name {
                    return Err(FsError::NoFile);
                }
            }
            OpenMode::CreateAlways => {
                self.name.clear();
                self.name.push_str(name).map_err(|_| FsError::InvalidName)?;
                self.exists = true;
                self.len = 0;
            }
        }
        self.open_handles += 1;
        if mode == OpenMode::Read {
            self.open_readers += 1;
        }
        Ok(MockFile { pos: 0, mode })
    }

    fn read(&mut self, file: &mut MockFile, buf: &mut [u8]) -> Result<usize, FsError> {
        let start = file.pos as usize;
        let end = (start + buf.len()).min(self.len as usize);
        let n = end.saturating_sub(start);
        for (i, out) in buf[..n].iter_mut().enumerate() {
            *out = self.data.get(start + i).copied().unwrap_or(0);
        }
        file.pos += n as u32;
        Ok(n)
    }

    fn write(&mut self, file: &mut MockFile, buf: &[u8]) -> Result<usize, FsError> {
        if file.mode != OpenMode::CreateAlways {
            return Err(FsError::Denied);
        }
        self.write_calls += 1;
        let start = file.pos as usize;
        let mut n = buf.len().min(MOCK_FILE_CAPACITY.saturating_sub(start));
        if let Some(limit) = self.writes_before_short {
            if self.write_calls > limit {
                n = n.min(buf.len() / 2);
            }
        }
        if n > 0 {
            self.data[start..start + n].copy_from_slice(&buf[..n]);
        }
        file.pos += n as u32;
        self.len = self.len.max(file.pos);
        Ok(n)
    }

    fn seek(&mut self, file: &mut MockFile, position: u32) -> Result<(), FsError> {
        file.pos = position;
        if file.mode == OpenMode::CreateAlways {
            self.len = self.len.max(position);
        }
        Ok(())
    }

    fn tell(&self, file: &MockFile) -> u32 {
        file.pos
    }

    fn truncate(&mut self, file: &mut MockFile) -> Result<(), FsError> {
        self.len = file.pos;
        self.truncated = true;
        Ok(())
    }

    fn close(&mut self, file: MockFile) -> Result<(), FsError> {
        self.open_handles -= 1;
        if file.mode == OpenMode::Read {
            self.open_readers -= 1;
        }
        Ok(())
    }
}

// ── Board ──────────────────────────────────────────────────────────────────

pub struct MockBoard;

impl Board for MockBoard {
    type Converter = MockConverter;
    type Clock = MockClock;
    type Dma = MockDma;
    type Link = MockLink;
    type Storage = MockFs;
    type Output = MockOutput;
    type Console = MockConsole;
    type Loader = MockLoader;
}

pub fn peripherals(storage: MockFs) -> Peripherals<MockBoard> {
    Peripherals {
        clock: MockClock::default(),
        link: MockLink::default(),
        storage,
        output: MockOutput::default(),
        console: MockConsole::default(),
        loader: MockLoader,
    }
}

pub fn mock_shared() -> Shared<MockBoard> {
    Shared::new(MockDma::default(), MockConverter::default())
}

impl Shared<MockBoard> {
    /// Whether either mock channel is enabled.
    pub fn dma_running(&self) -> bool {
        self.transfer().with_dma(|dma| dma.running())
    }
}
