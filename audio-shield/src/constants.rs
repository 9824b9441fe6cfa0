/// Bytes in one half of the ping-pong buffer pair.
pub const HALF_BUFFER_BYTES: usize = 1024;

/// 16-bit samples in one half of the buffer pair.
pub const HALF_BUFFER_SAMPLES: usize = HALF_BUFFER_BYTES / 2;

/// 16-bit samples across both halves, the span the effect cursor wraps over.
pub const TOTAL_SAMPLES: usize = HALF_BUFFER_SAMPLES * 2;

/// Bytes carried by one `D`/`J` link stream block.
pub const STREAM_BLOCK_BYTES: usize = 128;

/// Link stream blocks that fit in one buffer half.
pub const BLOCKS_PER_HALF: u8 = (HALF_BUFFER_BYTES / STREAM_BLOCK_BYTES) as u8;

/// Link stream blocks that fit in the whole buffer pair.
pub const BLOCKS_TOTAL: u8 = BLOCKS_PER_HALF * 2;

/// Largest exchange the link protocol carries (a stream block plus one byte).
pub const EXCHANGE_BUFFER_BYTES: usize = STREAM_BLOCK_BYTES + 1;

/// NUL-padded 8.3 filename as sent over the link.
pub const FILENAME_BYTES: usize = 13;

/// Longest 8.3 filename, without the terminator.
pub const FILENAME_MAX_CHARS: usize = FILENAME_BYTES - 1;

/// Firmware version reported by `Z`.
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 2;
pub const VERSION_BUILD: u16 = 97;

/// Confirmation word the host must send with `@` before the medium is reformatted.
pub const FORMAT_CONFIRMATION: u32 = 0x9D3C_25E8;

/// Status polls before `wait_for_disable` gives up on the transfer channels.
pub const SETTLE_SPIN_LIMIT: u32 = 100_000;

/// Bytes per megabyte for `S` presizing.
pub const PRESIZE_UNIT_BYTES: u32 = 1024 * 1024;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_package() {
        assert_eq!(env!("CARGO_PKG_VERSION_MAJOR").parse::<u8>(), Ok(VERSION_MAJOR));
        assert_eq!(env!("CARGO_PKG_VERSION_MINOR").parse::<u8>(), Ok(VERSION_MINOR));
    }

    #[test]
    fn stream_blocks_tile_the_buffer_pair() {
        assert_eq!(HALF_BUFFER_BYTES % STREAM_BLOCK_BYTES, 0);
        assert_eq!(BLOCKS_PER_HALF, 8);
        assert_eq!(BLOCKS_TOTAL, 16);
    }
}
