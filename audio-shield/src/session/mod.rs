//! Session state machine and interrupt routing.
//!
//! [`Engine`] owns the main-loop peripherals and drives sessions. Exactly
//! one [`SessionState`] holds at a time; each `start_*` tears down whatever
//! ran before, and [`Engine::stop`] is legal from any state.
//!
//! ## Contexts
//!
//! | Entry point | Context | Work |
//! |-------------|---------|------|
//! | [`Engine::poll`] | main loop | one link exchange, then the storage pump |
//! | [`Shared::on_transfer_complete`] | transfer ISR | flip halves, per-mode bookkeeping |
//! | [`Shared::on_converter_sample`] | converter ISR | pass-through effects |
//! | [`LinkExchange::on_byte`] | link ISR | byte staging |
//!
//! Interrupts never take the engine. Everything they share with the main
//! loop lives in [`Shared`]: the buffer pair position and the playback marks
//! are atomics, the converter, channels and effect state each sit behind
//! their own short critical section, and the samples change hands by the
//! ping-pong protocol. The main loop can therefore block on storage without
//! masking interrupts.
//!
//! ## Completion routing
//!
//! | State | Transfer completion does |
//! |-------|--------------------------|
//! | `PlayingFromStorage` | stop the channels after the last half, silence a half played after it |
//! | `PlayingFromLink` | return eight blocks to the free count |
//! | `RecordingToLink` | add eight blocks to the full count |
//! | anything else | only the half flip |

mod pump;

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use critical_section::Mutex;

use crate::boot::BootCommand;
use crate::buffer::format::{decode_le_to_dac, encode_le};
use crate::buffer::{BufferPair, Half, SILENCE};
use crate::constants::{FILENAME_BYTES, FORMAT_CONFIRMATION};
use crate::control::OutputControl;
use crate::effects::{Effect, EffectsProcessor};
use crate::fail::{FailMajor, FailMinor, FailureCode, FailureLatch};
use crate::hal::{
    Board, Console, Converter, Direction, Gains, InputSource, LinkPort, Peripherals, RateClock,
    Reprogrammer,
};
use crate::io::{BlockCursor, StreamCounters, TransferCoordinator};
use crate::link::LinkExchange;
use crate::storage::{FileName, FileSystem};
use crate::wav::{presize, WavReader, WavWriter};

/// High-level activity, with the code reported in every command-phase status
/// byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum SessionState {
    Idle = 0,
    RecordingToStorage = 1,
    PlayingFromStorage = 2,
    PlayingFromLink = 3,
    RecordingToLink = 4,
    PassThrough = 5,
    /// Never held by the engine; the link answers it while an exchange is
    /// being processed.
    Busy = 6,
}

impl SessionState {
    const fn from_code(code: u8) -> Self {
        match code {
            1 => SessionState::RecordingToStorage,
            2 => SessionState::PlayingFromStorage,
            3 => SessionState::PlayingFromLink,
            4 => SessionState::RecordingToLink,
            5 => SessionState::PassThrough,
            6 => SessionState::Busy,
            _ => SessionState::Idle,
        }
    }
}

/// Per-half "last buffer" marks plus the deferred first start, for storage
/// and link playback. Written by the main loop, read by the transfer
/// interrupt.
pub(crate) struct PlaybackFlags {
    last: [AtomicBool; 2],
    kickstart: AtomicBool,
}

impl PlaybackFlags {
    const fn new() -> Self {
        Self {
            last: [AtomicBool::new(false), AtomicBool::new(false)],
            kickstart: AtomicBool::new(false),
        }
    }

    fn reset(&self) {
        for last in &self.last {
            last.store(false, Ordering::Release);
        }
        self.kickstart.store(false, Ordering::Release);
    }

    fn arm_kickstart(&self) {
        self.kickstart.store(true, Ordering::Release);
    }

    /// Whether the first start is still owed, clearing it.
    fn take_kickstart(&self) -> bool {
        self.kickstart.swap(false, Ordering::AcqRel)
    }

    fn mark_last(&self, half: Half) {
        self.last[half.index()].store(true, Ordering::Release);
    }

    fn is_last(&self, half: Half) -> bool {
        self.last[half.index()].load(Ordering::Acquire)
    }

    fn any_last(&self) -> bool {
        self.is_last(Half::First) || self.is_last(Half::Second)
    }
}

/// State shared between the main loop and the interrupt handlers.
///
/// Construct it once and keep it in a `static` (it is `Sync` whenever the
/// board's converter and channels are `Send`); the engine and every handler
/// borrow it.
pub struct Shared<B: Board> {
    link: LinkExchange,
    stream: StreamCounters,
    failure: FailureLatch,
    buffers: BufferPair,
    playback: PlaybackFlags,
    state: AtomicU8,
    transfer: TransferCoordinator<B::Dma>,
    converter: Mutex<RefCell<B::Converter>>,
    effects: Mutex<RefCell<EffectsProcessor>>,
}

impl<B: Board> Shared<B> {
    pub const fn new(dma: B::Dma, converter: B::Converter) -> Self {
        Self {
            link: LinkExchange::new(),
            stream: StreamCounters::new(),
            failure: FailureLatch::new(),
            buffers: BufferPair::new(),
            playback: PlaybackFlags::new(),
            state: AtomicU8::new(SessionState::Idle as u8),
            transfer: TransferCoordinator::new(dma),
            converter: Mutex::new(RefCell::new(converter)),
            effects: Mutex::new(RefCell::new(EffectsProcessor::new())),
        }
    }

    /// Transfer-complete interrupt for `finished`.
    pub fn on_transfer_complete(&self, finished: Half) {
        self.transfer.on_half_complete(&self.buffers, finished);
        match self.state() {
            SessionState::PlayingFromStorage => {
                if self.playback.is_last(finished) {
                    self.transfer.off();
                } else if self.playback.is_last(finished.other()) {
                    // The hardware wraps onto this half once more before the
                    // off request lands; make it silent.
                    // SAFETY: once a last mark is set the pump stops touching
                    // the pool, and the hardware has just left `finished`.
                    unsafe { self.buffers.region_mut(finished.samples()) }.fill(SILENCE);
                }
            }
            SessionState::PlayingFromLink => self.stream.release_half(),
            SessionState::RecordingToLink => self.stream.fill_half(),
            _ => {}
        }
    }

    /// Converter-complete interrupt.
    pub fn on_converter_sample(&self) {
        let kickstart = critical_section::with(|cs| {
            let mut effects = self.effects.borrow_ref_mut(cs);
            if effects.selected().is_none() {
                return false;
            }
            let (left, right) = self.converter.borrow_ref_mut(cs).read_pair();
            // SAFETY: while an effect is selected no main-loop path touches
            // the pool; `stop` deselects before anything else may.
            let pool = unsafe { self.buffers.pool_mut() };
            effects.process(pool, left, right)
        });
        if kickstart {
            self.transfer.kickstart();
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_code(self.state.load(Ordering::Acquire))
    }

    pub fn link(&self) -> &LinkExchange {
        &self.link
    }

    pub fn stream(&self) -> &StreamCounters {
        &self.stream
    }

    pub fn failure(&self) -> &FailureLatch {
        &self.failure
    }

    pub fn buffers(&self) -> &BufferPair {
        &self.buffers
    }

    pub fn transfer(&self) -> &TransferCoordinator<B::Dma> {
        &self.transfer
    }

    /// Run `f` on the converter inside a critical section.
    pub fn with_converter<R>(&self, f: impl FnOnce(&mut B::Converter) -> R) -> R {
        critical_section::with(|cs| {
            let mut converter = self.converter.borrow_ref_mut(cs);
            f(&mut *converter)
        })
    }

    /// Effect armed for the running pass-through, if any.
    pub fn effect(&self) -> Option<Effect> {
        self.with_effects(|effects| effects.selected())
    }

    fn with_effects<R>(&self, f: impl FnOnce(&mut EffectsProcessor) -> R) -> R {
        critical_section::with(|cs| {
            let mut effects = self.effects.borrow_ref_mut(cs);
            f(&mut *effects)
        })
    }
}

/// The audio engine: session control, main-loop peripherals and the open
/// files.
pub struct Engine<'a, B: Board> {
    shared: &'a Shared<B>,

    clock: B::Clock,
    link: B::Link,
    storage: B::Storage,
    output: B::Output,
    console: B::Console,
    loader: B::Loader,

    gains: Gains,
    rate: u16,
    stereo: bool,

    reader: Option<WavReader<B::Storage>>,
    writer: Option<WavWriter<B::Storage>>,
    /// Next block slot `D` fills.
    head: BlockCursor,
    /// Next block `J` returns.
    tail: BlockCursor,
}

impl<'a, B: Board> Engine<'a, B> {
    pub fn new(shared: &'a Shared<B>, peripherals: Peripherals<B>) -> Self {
        Self {
            shared,
            clock: peripherals.clock,
            link: peripherals.link,
            storage: peripherals.storage,
            output: peripherals.output,
            console: peripherals.console,
            loader: peripherals.loader,
            gains: Gains::default(),
            rate: 0,
            stereo: false,
            reader: None,
            writer: None,
            head: BlockCursor::new(),
            tail: BlockCursor::new(),
        }
    }

    /// Bring the engine to Idle, put the output in its startup state and arm
    /// the first command phase.
    pub fn init(&mut self) {
        self.stop();
        let gains = self.gains;
        self.shared.with_converter(|converter| converter.set_gains(gains));
        self.output_op(|out| {
            out.disable()?;
            out.max_gain(false)?;
            out.bass_max(true)
        });
        if let Some(first) = self.shared.link.start(self.state() as u8) {
            self.link.preload(first);
        }
        #[cfg(feature = "defmt")]
        defmt::info!("engine ready");
    }

    /// One main-loop iteration.
    pub fn poll(&mut self) {
        self.service_link();
        match self.state() {
            SessionState::PlayingFromStorage => self.pump_playback(),
            SessionState::RecordingToStorage => self.pump_record(),
            _ => {}
        }
    }

    pub fn state(&self) -> SessionState {
        self.shared.state()
    }

    pub fn shared(&self) -> &'a Shared<B> {
        self.shared
    }

    fn set_state(&mut self, next: SessionState) {
        #[cfg(feature = "defmt")]
        if next != self.state() {
            defmt::info!("session {} -> {}", self.state(), next);
        }
        self.shared.state.store(next as u8, Ordering::Release);
    }

    fn fail(&self, code: FailureCode) {
        self.shared.failure.set(code);
    }

    // ── Stop ───────────────────────────────────────────────────────────────

    /// Tear down any session and return to Idle.
    ///
    /// Blocks while the transfer channels settle. A recording is finalized
    /// here; its failure, if any, is recorded before a settle timeout.
    pub fn stop(&mut self) {
        let shared = self.shared;
        shared.with_effects(|effects| effects.deselect());
        let settled = shared.transfer.halt(&shared.buffers);
        shared.with_converter(|converter| converter.stop());
        self.clock.stop();

        if let Some(writer) = self.writer.take() {
            match writer.finalize(&mut self.storage) {
                Ok(_bytes) => {
                    #[cfg(feature = "defmt")]
                    defmt::info!("recording finalized, {} data bytes", _bytes);
                    shared.failure.clear();
                }
                Err(code) => self.fail(code),
            }
        }
        if let Some(reader) = self.reader.take() {
            reader.close(&mut self.storage);
        }
        if let Err(code) = settled {
            #[cfg(feature = "defmt")]
            defmt::warn!("transfer channels did not settle");
            self.fail(code);
        }

        shared.playback.reset();
        self.set_state(SessionState::Idle);
        // After Idle, so a completion already in flight cannot top them up.
        shared.stream.reset();
    }

    // ── Session starts ─────────────────────────────────────────────────────

    /// Rate zero is never a valid sample clock; the command is dropped.
    fn accept_rate(&self, rate: u16) -> bool {
        if rate == 0 {
            #[cfg(feature = "defmt")]
            defmt::warn!("ignoring session start with zero sample rate");
            return false;
        }
        true
    }

    /// Shared tail of both capture sessions.
    fn start_capture(&mut self, rate: u16, stereo: bool, source: InputSource) {
        let shared = self.shared;
        self.rate = rate;
        self.stereo = stereo;
        shared
            .transfer
            .begin(Direction::Capture, stereo, &shared.buffers);
        shared.buffers.set_position(Half::First, false);
        shared.transfer.kickstart();
        shared.with_converter(|converter| converter.start(source));
        self.clock.start(rate);
    }

    /// Record the selected input to `name` on the storage medium.
    pub fn start_record_to_storage(
        &mut self,
        name: &FileName,
        rate: u16,
        stereo: bool,
        source: InputSource,
    ) {
        self.stop();
        if !self.accept_rate(rate) {
            return;
        }
        self.shared.failure.begin(FailMajor::WavCreate);
        match WavWriter::create(&mut self.storage, name.as_str(), stereo, rate) {
            Ok(writer) => {
                self.writer = Some(writer);
                self.shared.failure.clear();
                self.set_state(SessionState::RecordingToStorage);
                self.start_capture(rate, stereo, source);
            }
            Err(code) => self.fail(code),
        }
    }

    /// Play `name` from the storage medium at its own rate and channel count.
    ///
    /// The channels are configured here but started by the pump once the
    /// first half is filled.
    pub fn start_play_from_storage(&mut self, name: &FileName) {
        self.stop();
        let shared = self.shared;
        shared.failure.begin(FailMajor::WavOpen);
        let reader = match WavReader::open(&mut self.storage, name.as_str()) {
            Ok(reader) => reader,
            Err(code) => {
                self.fail(code);
                return;
            }
        };

        let info = *reader.info();
        // The reader only accepts rates that fit the clock.
        self.rate = info.sample_rate as u16;
        self.stereo = info.is_stereo();
        self.reader = Some(reader);
        shared.failure.clear();

        shared
            .transfer
            .begin(Direction::Playback, self.stereo, &shared.buffers);
        // Pretend the hardware is on the second half and just finished the
        // first, so the pump fills the first half before anything plays.
        shared.buffers.set_position(Half::Second, true);
        shared.playback.arm_kickstart();
        self.set_state(SessionState::PlayingFromStorage);
    }

    /// Play blocks the host delivers with `D`. The channels start once the
    /// first half has been delivered.
    pub fn start_play_from_link(&mut self, rate: u16, stereo: bool) {
        self.stop();
        if !self.accept_rate(rate) {
            return;
        }
        let shared = self.shared;
        self.rate = rate;
        self.stereo = stereo;
        shared
            .transfer
            .begin(Direction::Playback, stereo, &shared.buffers);
        shared.buffers.set_position(Half::First, false);
        shared.stream.reset_for_playback();
        self.head = BlockCursor::new();
        shared.playback.arm_kickstart();
        self.set_state(SessionState::PlayingFromLink);
    }

    /// Capture into the buffer pair for the host to drain with `J`.
    pub fn start_record_to_link(&mut self, rate: u16, stereo: bool, source: InputSource) {
        self.stop();
        if !self.accept_rate(rate) {
            return;
        }
        self.shared.stream.reset();
        self.tail = BlockCursor::new();
        self.set_state(SessionState::RecordingToLink);
        self.start_capture(rate, stereo, source);
    }

    /// Route the input to the output through `effect` at the sample rate.
    pub fn start_pass_through(
        &mut self,
        effect: Effect,
        rate: u16,
        stereo: bool,
        source: InputSource,
    ) {
        self.stop();
        if !self.accept_rate(rate) {
            return;
        }
        let shared = self.shared;
        self.rate = rate;
        self.stereo = stereo;
        // SAFETY: the stop above halted the channels and deselected the
        // effects, so nothing else touches the pool.
        unsafe { shared.buffers.pool_mut() }.clear();
        shared.buffers.set_position(Half::First, false);
        shared.with_effects(|effects| effects.select(effect, stereo));
        self.set_state(SessionState::PassThrough);

        shared.with_converter(|converter| converter.start(source));
        shared
            .transfer
            .begin(Direction::Playback, stereo, &shared.buffers);
        self.clock.start(rate);
    }

    // ── Link streaming ─────────────────────────────────────────────────────

    /// Copy one delivered playback block into the next free slot.
    pub(crate) fn deliver_block(&mut self, block: &[u8]) {
        if self.state() != SessionState::PlayingFromLink {
            return;
        }
        let shared = self.shared;
        if !shared.stream.take_free() {
            #[cfg(feature = "defmt")]
            defmt::warn!("link block dropped, no free slot");
            return;
        }
        // SAFETY: a free slot lies in a half the hardware has finished with
        // and will not play again until that half is released.
        let slot = unsafe { shared.buffers.region_mut(self.head.range()) };
        decode_le_to_dac(block, slot);
        if self.head.advance() && shared.playback.take_kickstart() {
            self.clock.start(self.rate);
            shared.transfer.kickstart();
        }
    }

    /// Copy the oldest recorded block into `out`, or silence if none is ready.
    pub(crate) fn collect_block(&mut self, out: &mut [u8]) {
        let shared = self.shared;
        if self.state() == SessionState::RecordingToLink && shared.stream.take_full() {
            // SAFETY: a full block lies in a half the hardware has finished
            // capturing into.
            encode_le(unsafe { shared.buffers.region(self.tail.range()) }, out);
            self.tail.advance();
        } else {
            out.fill(0);
        }
    }

    // ── Settings and media ─────────────────────────────────────────────────

    pub(crate) fn set_gains(&mut self, gains: Gains) {
        self.gains = gains;
        self.shared.with_converter(|converter| converter.set_gains(gains));
    }

    /// Run an output-control operation, recording a bus failure.
    pub(crate) fn output_op(
        &mut self,
        op: impl FnOnce(&mut B::Output) -> Result<(), <B::Output as OutputControl>::Error>,
    ) {
        if op(&mut self.output).is_err() {
            self.fail(FailureCode::new(FailMajor::Output, FailMinor::Bus));
        }
    }

    pub(crate) fn set_console_tx(&mut self, enabled: bool) {
        self.console.set_tx_enabled(enabled);
    }

    /// Initialize and mount the medium, then apply `bus_speed`.
    pub fn mount(&mut self, bus_speed: u8) {
        let mount_error = |minor| FailureCode::new(FailMajor::Mount, minor);
        self.shared.failure.begin(FailMajor::Mount);
        if self.storage.initialize().is_err() {
            self.fail(mount_error(FailMinor::NoInit));
            return;
        }
        if self.storage.mount().is_err() {
            self.fail(mount_error(FailMinor::NoMount));
            return;
        }
        self.storage.set_bus_speed(bus_speed);
        self.shared.failure.clear();
        #[cfg(feature = "defmt")]
        defmt::info!("medium mounted, bus speed {}", bus_speed);
    }

    /// Reformat the medium if `confirmation` matches.
    pub fn format(&mut self, confirmation: u32) {
        self.fail(FailureCode::new(FailMajor::Format, FailMinor::BadCode));
        if confirmation != FORMAT_CONFIRMATION {
            return;
        }
        // Nothing may hold a file across the format.
        self.stop();
        self.shared.failure.begin(FailMajor::Format);
        match self.storage.make_filesystem() {
            Ok(()) => self.shared.failure.clear(),
            Err(_) => self.fail(FailureCode::new(FailMajor::Format, FailMinor::FormatFailed)),
        }
    }

    /// Reserve `megabytes` for `name`.
    pub fn presize(&mut self, name: &FileName, megabytes: u16) {
        self.shared.failure.begin(FailMajor::Presize);
        match presize(&mut self.storage, name.as_str(), megabytes) {
            Ok(()) => self.shared.failure.clear(),
            Err(code) => self.fail(code),
        }
    }

    /// Stop everything and hand control to the reprogramming agent.
    pub fn reprogram(&mut self, filename: &[u8; FILENAME_BYTES]) -> ! {
        self.stop();
        let command = BootCommand::program_from_file(filename);
        #[cfg(feature = "defmt")]
        defmt::info!("handing off to loader, crc {=u16:#x}", command.crc());
        self.loader.reprogram(&command)
    }

    pub(crate) fn loader_version(&self) -> u16 {
        self.loader.loader_version()
    }

    pub(crate) fn media_present(&self) -> bool {
        self.storage.media_present()
    }

    pub(crate) fn preload(&mut self, byte: u8) {
        self.link.preload(byte);
    }

    // ── Inspection ─────────────────────────────────────────────────────────

    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Sample rate of the current or last session.
    pub fn rate(&self) -> u16 {
        self.rate
    }

    pub fn is_stereo(&self) -> bool {
        self.stereo
    }

    pub fn storage(&self) -> &B::Storage {
        &self.storage
    }

    pub fn clock(&self) -> &B::Clock {
        &self.clock
    }

    pub fn output(&self) -> &B::Output {
        &self.output
    }

    pub fn console(&self) -> &B::Console {
        &self.console
    }

    pub fn link_port(&self) -> &B::Link {
        &self.link
    }

    #[cfg(test)]
    pub(crate) fn link_port_mut(&mut self) -> &mut B::Link {
        &mut self.link
    }

    #[cfg(test)]
    pub(crate) fn storage_mut(&mut self) -> &mut B::Storage {
        &mut self.storage
    }

    #[cfg(test)]
    pub(crate) fn output_mut(&mut self) -> &mut B::Output {
        &mut self.output
    }
}
