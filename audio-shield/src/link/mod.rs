//! Host link protocol.
//!
//! Two layers:
//! - [`exchange`]: the interrupt-driven byte mailbox with one-byte-ahead
//!   response staging.
//! - [`commands`]: the table mapping a command byte to its data-phase length,
//!   staged response and deferred action.
//!
//! [`Engine::service_link`] glues them to the session engine from the main
//! loop. Every exchange goes through two phases:
//!
//! ```text
//! AwaitingCommand ──(cmd byte)──► stage response, arm n bytes ──► AwaitingData
//!        ▲                                                            │
//!        └─────── run action with payload, stage status ◄──(n bytes)──┘
//! ```
//!
//! Commands with no data phase run as soon as the command byte is in and
//! re-arm the command phase directly.

pub mod commands;
pub mod exchange;

pub use commands::{lookup, Action, Command, Payload, Response};
pub use exchange::{Completed, LinkExchange, Phase, BUSY};

use crate::constants::{VERSION_BUILD, VERSION_MAJOR, VERSION_MINOR};
use crate::control::OutputControl;
use crate::effects::Effect;
use crate::fail::{FailMajor, FailMinor, FailureCode};
use crate::hal::{Board, Gain, Gains, InputSource};
use crate::session::Engine;
use crate::storage::FileName;

impl<'a, B: Board> Engine<'a, B> {
    /// Handle one completed exchange, if the link has one.
    pub fn service_link(&mut self) {
        let link = self.shared().link();
        let Some(mut done) = link.take() else {
            return;
        };

        let next = match done.phase() {
            Phase::AwaitingCommand => {
                let code = done.received()[0];
                match lookup(code) {
                    None => {
                        #[cfg(feature = "defmt")]
                        defmt::warn!("unknown link command {=u8:#x}", code);
                        done.arm_command(self.state() as u8)
                    }
                    Some(command) if command.exchange_len == 0 => {
                        self.run(command.action, code, &[]);
                        done.arm_command(self.state() as u8)
                    }
                    Some(command) => {
                        self.stage(command.response, &mut done.response_mut()[..command.exchange_len]);
                        done.arm_data(code, command.exchange_len)
                    }
                }
            }
            Phase::AwaitingData => {
                let code = done.command();
                if let Some(command) = lookup(code) {
                    self.run(command.action, code, &done.received()[..command.exchange_len]);
                }
                done.arm_command(self.state() as u8)
            }
        };
        self.preload(next);
    }

    /// Fill `out` with the response the host reads during the data phase.
    fn stage(&mut self, response: Response, out: &mut [u8]) {
        match response {
            Response::Nothing => {}
            Response::Sync => out[0] = b'_',
            Response::Version => {
                out[0] = VERSION_MAJOR;
                out[1] = VERSION_MINOR;
                out[2..4].copy_from_slice(&VERSION_BUILD.to_le_bytes());
                out[4..6].copy_from_slice(&self.loader_version().to_le_bytes());
                out[6] = u8::from(self.media_present());
            }
            Response::Failure => {
                out.copy_from_slice(&self.shared().failure().take().to_bytes());
            }
            Response::FullBlocks => out[0] = self.shared().stream().full(),
            Response::FreeBlocks => out[0] = self.shared().stream().free().saturating_sub(1),
            Response::RecordedBlock => self.collect_block(out),
        }
    }

    /// Run the deferred part of command `code`.
    fn run(&mut self, action: Action, code: u8, payload: &[u8]) {
        let mut p = Payload::new(payload);
        match action {
            Action::None => {}
            Action::Stop => self.stop(),
            Action::Mount => self.mount(p.u8()),
            Action::Format => self.format(p.u32()),
            Action::Gains => {
                let line = Gain::from_code(p.u8());
                let mic = Gain::from_code(p.u8());
                self.set_gains(Gains { line, mic });
            }
            Action::Headphones => {
                let on = p.u8() != 0;
                self.output_op(|out| if on { out.enable() } else { out.disable() });
            }
            Action::Volume => {
                let level = p.u8();
                self.output_op(|out| out.volume(level));
            }
            Action::MaxGain => {
                let on = p.u8() != 0;
                self.output_op(|out| out.max_gain(on));
            }
            Action::BassMax => {
                let on = p.u8() != 0;
                self.output_op(|out| out.bass_max(on));
            }
            Action::ConsoleTx => self.set_console_tx(p.u8() != 0),
            Action::PlayFile => match FileName::from_padded(&p.filename()) {
                Some(name) => self.start_play_from_storage(&name),
                None => self.reject_name(FailMajor::WavOpen),
            },
            Action::RecordFile => {
                let rate = p.u16();
                let stereo = p.u8() != 0;
                let source = InputSource::from_code(p.u8());
                match FileName::from_padded(&p.filename()) {
                    Some(name) => self.start_record_to_storage(&name, rate, stereo, source),
                    None => self.reject_name(FailMajor::WavCreate),
                }
            }
            Action::Presize => {
                let megabytes = p.u16();
                match FileName::from_padded(&p.filename()) {
                    Some(name) => self.presize(&name, megabytes),
                    None => self.reject_name(FailMajor::Presize),
                }
            }
            Action::PlayFromLink => {
                let rate = p.u16();
                let stereo = p.u8() != 0;
                self.start_play_from_link(rate, stereo);
            }
            Action::RecordToLink => {
                let rate = p.u16();
                let stereo = p.u8() != 0;
                let source = InputSource::from_code(p.u8());
                self.start_record_to_link(rate, stereo, source);
            }
            Action::PassThrough => {
                let rate = p.u16();
                let stereo = p.u8() != 0;
                let source = InputSource::from_code(p.u8());
                if let Some(effect) = Effect::from_code(code) {
                    self.start_pass_through(effect, rate, stereo, source);
                }
            }
            Action::DeliverBlock => self.deliver_block(payload),
            Action::Reprogram => self.reprogram(&p.filename()),
        }
    }

    fn reject_name(&self, major: FailMajor) {
        #[cfg(feature = "defmt")]
        defmt::warn!("bad filename field");
        self.shared()
            .failure()
            .set(FailureCode::new(major, FailMinor::NoFile));
    }
}
