//! # audio-shield
//!
//! A `no_std`, zero-allocation engine for an audio recording/playback
//! shield. It moves 16-bit audio between an analog front end, a removable
//! storage medium and a host controller on a byte-synchronous link, and can
//! route the input straight to the output through sample-rate effects.
//!
//! Peripherals sit behind the traits in [`hal`], so the whole engine runs
//! and is tested on the host.
//!
//! ## Architecture
//!
//! | Layer | Module | Purpose |
//! |-------|--------|---------|
//! | Memory | [`buffer`] | Two-half ping-pong buffer pool and sample formats |
//! | Transfer | [`io`] | Ping-pong channel control, link block accounting |
//! | Effects | [`effects`] | Direct, echo and comb pass-through at the sample rate |
//! | Session | [`session`] | State machine, storage pump, interrupt routing |
//! | Link | [`link`] | Byte mailbox and command table for the host protocol |
//! | Storage | [`storage`] / [`wav`] | File system seam and the WAV container |
//! | Control | [`control`] / [`codec`] | Output amplifier trait and MAX9723 driver (feature-gated) |
//! | Errors | [`fail`] | `(major, minor)` failure codes and the latch |
//! | Loader | [`boot`] | Reprogramming command area |
//!
//! ## Wiring
//!
//! ```ignore
//! static SHARED: Shared<MyBoard> = Shared::new(MyDma::new(), MyAdc::new());
//!
//! let mut engine = Engine::new(&SHARED, peripherals);
//! engine.init();
//!
//! // Link byte interrupt
//! let reply = SHARED.link().on_byte(rx);
//! link_data_register.write(reply);
//!
//! // Transfer-complete interrupt for channel n
//! SHARED.on_transfer_complete(half);
//!
//! // Converter-complete interrupt
//! SHARED.on_converter_sample();
//!
//! loop {
//!     engine.poll();
//! }
//! ```
//!
//! The main loop owns the [`Engine`] outright. Interrupt handlers only ever
//! see [`Shared`], whose buffer position and playback marks are atomics and
//! whose converter, channels and effect state sit behind short critical
//! sections, so storage reads and writes in [`Engine::poll`] run with
//! interrupts enabled.
//!
//! ## Features
//!
//! | Feature | Default | Enables |
//! |---------|---------|---------|
//! | `max9723` | yes | MAX9723 amplifier driver (requires `embedded-hal`) |
//! | `defmt` | no | `defmt::Format` on public types and log output |
//!
//! ## Audio parameters
//!
//! - **Buffer pool:** two halves of 512 samples ([`constants::HALF_BUFFER_SAMPLES`])
//! - **Link block:** 128 bytes, eight per half ([`constants::STREAM_BLOCK_BYTES`])
//! - **Sample format:** `i16` when recording, offset binary (`u16`) when playing
//! - **Sample rate:** chosen per session, 1 to 65 535 Hz

#![no_std]

pub mod boot;
pub mod buffer;
pub mod constants;
pub mod control;
pub mod effects;
pub mod fail;
pub mod hal;
pub mod io;
pub mod link;
pub mod session;
pub mod storage;
pub mod wav;

#[cfg(feature = "max9723")]
pub mod codec;

pub use session::{Engine, SessionState, Shared};

#[cfg(test)]
mod mock;
