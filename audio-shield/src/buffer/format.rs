//! Sample format conversion.
//!
//! The converter produces signed two's-complement samples; the DAC consumes
//! offset-binary. The two differ only in the most significant bit, so
//! conversion in either direction is the same toggle.

/// Bit that separates the two encodings.
pub const SIGN_BIT: u16 = 0x8000;

/// Offset-binary midscale, the DAC's idea of zero.
pub const SILENCE: u16 = SIGN_BIT;

/// Signed converter sample to DAC format.
#[inline(always)]
pub const fn to_dac(sample: i16) -> u16 {
    (sample as u16) ^ SIGN_BIT
}

/// DAC-format sample back to signed.
#[inline(always)]
pub const fn to_signed(sample: u16) -> i16 {
    (sample ^ SIGN_BIT) as i16
}

/// Convert a run of samples in place. Applying it twice restores the input.
#[inline]
pub fn toggle_sign(samples: &mut [u16]) {
    for s in samples.iter_mut() {
        *s ^= SIGN_BIT;
    }
}

/// Decode little-endian signed samples from `src` into DAC format in `dst`.
///
/// `src` must hold exactly two bytes per destination sample.
#[inline]
pub fn decode_le_to_dac(src: &[u8], dst: &mut [u16]) {
    debug_assert_eq!(src.len(), dst.len() * 2);
    for (pair, out) in src.chunks_exact(2).zip(dst.iter_mut()) {
        *out = u16::from_le_bytes([pair[0], pair[1]]) ^ SIGN_BIT;
    }
}

/// Encode signed samples held in the pool as little-endian bytes.
#[inline]
pub fn encode_le(src: &[u16], dst: &mut [u8]) {
    debug_assert_eq!(dst.len(), src.len() * 2);
    for (s, pair) in src.iter().zip(dst.chunks_exact_mut(2)) {
        pair.copy_from_slice(&s.to_le_bytes());
    }
}
