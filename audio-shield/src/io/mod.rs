//! Sample movement between converters, memory and the host link.
//!
//! ## Components
//!
//! | Item | Context | Description |
//! |------|---------|-------------|
//! | [`TransferCoordinator`] | main loop + transfer/converter ISRs | Ping-pong channels between converters and the buffer pool, locked per register access |
//! | [`StreamCounters`] | main loop + transfer ISR | Free/full block counts for link streaming |
//! | [`BlockCursor`] | main loop | Head/tail position of the next link block |
//!
//! ## Buffer Layout
//!
//! Both directions use the same pool of two 1024-byte halves:
//! - Mono: one 16-bit sample per rate clock tick (2-byte burst)
//! - Stereo: interleaved left/right pairs (4-byte burst)
//! - A half holds eight 128-byte link blocks

pub mod stream;
pub mod transfer;

pub use stream::{BlockCursor, StreamCounters};
pub use transfer::TransferCoordinator;
