//! Sample conversions shared by the codecs.
//!
//! All byte views are little-endian and interleaved.

use crate::defaults::I16_SCALE;

/// Quantise a normalised float sample to 16 bits.
///
/// Multiplies by 32767 and truncates toward zero; out-of-range input is clamped.
pub fn f32_to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * I16_SCALE) as i16
}

/// Expand a 16-bit sample to a normalised float.
pub fn i16_to_f32(sample: i16) -> f32 {
    sample as f32 / I16_SCALE
}

/// Reinterpret little-endian IEEE float bytes as samples.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn f32_from_le_bytes(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

/// Reinterpret little-endian 16-bit bytes as samples.
pub fn i16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]))
        .collect()
}

pub fn f32_to_le_bytes(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

pub fn i16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert IEEE float bytes straight to 16-bit samples (the 32-to-16 stage
/// in front of the lossy encoder).
pub fn f32_bytes_to_i16(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(4)
        .map(|b| f32_to_i16(f32::from_le_bytes([b[0], b[1], b[2], b[3]])))
        .collect()
}
