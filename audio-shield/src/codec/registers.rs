//! MAX9723 headphone amplifier control byte.
//!
//! The device has a single 8-bit command register, written as one byte
//! after the address. There is no register pointer and no read-back.

// ── I2C address ────────────────────────────────────────────────────────────

/// 7-bit address of the MAX9723A/C (0x9A in 8-bit write form).
pub const I2C_ADDR: u8 = 0x4D;

// ── Command byte ───────────────────────────────────────────────────────────

/// Value the driver assumes before its first write.
pub const POWER_ON_COMMAND: u8 = 0xFF;

/// Bits 4:0: volume step (0 = mute-level minimum, 31 = maximum).
pub const VOLUME_MASK: u8 = 0x1F;

/// Bit 5, MAXGAIN: select the high gain range.
pub const MAXGAIN: u8 = 1 << 5;

/// Bit 6, BASSMAX: enable bass boost.
pub const BASSMAX: u8 = 1 << 6;

/// Bit 7, SHDN: active low, so set means running.
pub const NOT_SHUTDOWN: u8 = 1 << 7;
