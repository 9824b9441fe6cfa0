//! Ping-pong sample buffers.
//!
//! Every streaming mode shares one statically allocated pair of halves:
//!
//! ```text
//!            ┌──────────── TOTAL_SAMPLES ────────────┐
//!            │   Half::First      │   Half::Second    │
//!            │  512 × u16         │  512 × u16        │
//!            └────────────────────┴───────────────────┘
//!                 ▲ channel 0          ▲ channel 1
//! ```
//!
//! The hardware owns the active half. Software owns the other one, and
//! services it after the completion signal sets `half_done`.
//!
//! Samples are held signed when recording and offset-binary when playing;
//! [`format`] converts between the two.

pub mod format;
mod pool;

pub use format::{to_dac, to_signed, toggle_sign, SILENCE};
pub use pool::{BufferPair, BufferPool, Half};
