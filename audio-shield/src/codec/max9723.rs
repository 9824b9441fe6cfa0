//! MAX9723 headphone amplifier driver.
//!
//! The amplifier is write-only over I2C: every change rewrites the whole
//! command byte, so the driver caches it.
//!
//! # Example
//!
//! ```ignore
//! let mut amp = Max9723::new(i2c);
//! amp.init()?;          // shut down, normal gain, bass boost on
//! amp.volume(20)?;
//! amp.enable()?;
//! ```

use embedded_hal::i2c::I2c;

use super::registers as reg;
use crate::control::OutputControl;

// ── Driver struct ──────────────────────────────────────────────────────────

/// MAX9723 driver, generic over the I2C bus.
pub struct Max9723<I2C> {
    i2c: I2C,
    address: u8,
    /// Last command byte written (or the power-on value).
    command: u8,
}

impl<I2C: I2c> Max9723<I2C> {
    /// Default I2C address.
    pub const DEFAULT_ADDRESS: u8 = reg::I2C_ADDR;

    pub fn new(i2c: I2C) -> Self {
        Self::new_with_address(i2c, Self::DEFAULT_ADDRESS)
    }

    pub fn new_with_address(i2c: I2C, address: u8) -> Self {
        Self {
            i2c,
            address,
            command: reg::POWER_ON_COMMAND,
        }
    }

    /// Startup state: output shut down, normal gain range, bass boost on.
    pub fn init(&mut self) -> Result<(), I2C::Error> {
        self.disable()?;
        self.max_gain(false)?;
        self.bass_max(true)
    }

    /// Cached command byte.
    pub fn command(&self) -> u8 {
        self.command
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    /// Replace the bits in `mask` with `value` and write the byte out.
    fn update(&mut self, mask: u8, value: u8) -> Result<(), I2C::Error> {
        let next = (self.command & !mask) | (value & mask);
        self.i2c.write(self.address, &[next])?;
        self.command = next;
        Ok(())
    }

    fn set_bit(&mut self, bit: u8, on: bool) -> Result<(), I2C::Error> {
        self.update(bit, if on { bit } else { 0 })
    }
}

impl<I2C: I2c> OutputControl for Max9723<I2C> {
    type Error = I2C::Error;

    fn enable(&mut self) -> Result<(), Self::Error> {
        self.set_bit(reg::NOT_SHUTDOWN, true)
    }

    fn disable(&mut self) -> Result<(), Self::Error> {
        self.set_bit(reg::NOT_SHUTDOWN, false)
    }

    fn volume(&mut self, level: u8) -> Result<(), Self::Error> {
        self.update(reg::VOLUME_MASK, level)
    }

    fn max_gain(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.set_bit(reg::MAXGAIN, enabled)
    }

    fn bass_max(&mut self, enabled: bool) -> Result<(), Self::Error> {
        self.set_bit(reg::BASSMAX, enabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{self, ErrorType, Operation};

    // ── Mock I2C with write log ───────────────────────────────────────

    #[derive(Debug)]
    struct MockError;

    impl i2c::Error for MockError {
        fn kind(&self) -> i2c::ErrorKind {
            i2c::ErrorKind::Other
        }
    }

    /// Mock I2C that records single-byte writes.
    struct MockI2c {
        /// (address, byte) in chronological order.
        log: [(u8, u8); 16],
        log_count: usize,
        nack: bool,
    }

    impl MockI2c {
        fn new() -> Self {
            Self {
                log: [(0, 0); 16],
                log_count: 0,
                nack: false,
            }
        }

        fn last(&self) -> (u8, u8) {
            self.log[self.log_count - 1]
        }
    }

    impl ErrorType for MockI2c {
        type Error = MockError;
    }

    impl I2c for MockI2c {
        fn read(&mut self, _addr: u8, _buf: &mut [u8]) -> Result<(), Self::Error> {
            Ok(())
        }

        fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
            if self.nack {
                return Err(MockError);
            }
            if bytes.len() == 1 {
                self.log[self.log_count] = (addr, bytes[0]);
                self.log_count += 1;
            }
            Ok(())
        }

        fn write_read(
            &mut self,
            _addr: u8,
            _bytes: &[u8],
            _buffer: &mut [u8],
        ) -> Result<(), Self::Error> {
            Ok(())
        }

        fn transaction(
            &mut self,
            addr: u8,
            operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            for op in operations {
                if let Operation::Write(bytes) = op {
                    self.write(addr, bytes)?;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn init_sequence() {
        let mut amp = Max9723::new(MockI2c::new());
        amp.init().unwrap();

        let i2c = amp.release();
        assert_eq!(i2c.log_count, 3);
        assert_eq!(i2c.log[0], (0x4D, 0x7F));
        assert_eq!(i2c.log[1], (0x4D, 0x5F));
        assert_eq!(i2c.log[2], (0x4D, 0x5F));
    }

    #[test]
    fn volume_keeps_control_bits() {
        let mut amp = Max9723::new(MockI2c::new());
        amp.init().unwrap();
        amp.volume(0xE5).unwrap();
        assert_eq!(amp.command(), 0x40 | 0x05);

        amp.enable().unwrap();
        amp.max_gain(true).unwrap();
        assert_eq!(amp.command(), 0x80 | 0x40 | 0x20 | 0x05);
        assert_eq!(amp.release().last(), (0x4D, 0xE5));
    }

    #[test]
    fn failed_write_leaves_cache_untouched() {
        let mut i2c = MockI2c::new();
        i2c.nack = true;
        let mut amp = Max9723::new(i2c);
        assert!(amp.volume(3).is_err());
        assert_eq!(amp.command(), 0xFF);
    }

    #[test]
    fn custom_address() {
        let mut amp = Max9723::new_with_address(MockI2c::new(), 0x4C);
        amp.bass_max(false).unwrap();
        assert_eq!(amp.release().last(), (0x4C, 0xBF));
    }
}
