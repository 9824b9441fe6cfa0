//! Headphone amplifier driver module.
//!
//! Drives the MAX9723 stereo headphone amplifier that carries the
//! shield's volume, gain and bass controls.
//!
//! # Feature gate
//!
//! This module is available when the `max9723` feature is enabled (on by default).

pub(crate) mod registers;
mod max9723;

pub use max9723::Max9723;
