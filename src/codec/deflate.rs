//! Compressed lossless codec: raw deflate (fastest level) around either a
//! lossless container or a bare float sample array.
//!
//! Byte-stream layout:
//!   `[i32 compressed_len][deflate(WAV container)]`
//!
//! Sample-array layout:
//!   `[i32 uncompressed_len][i32 sample_count][i32 sample_rate][i32 channels][deflate(f32 LE samples)]`
//!
//! All integers are little-endian.

use crate::codec::{AudioFormat, DecodedAudio, pcm, wav};
use crate::error::{Result, StreamError};
use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

const LENGTH_PREFIX: usize = 4;
const ARCHIVE_HEADER: usize = 16;

/// Deflate cannot expand input by more than this factor.
const MAX_INFLATE_RATIO: usize = 1032;

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len() / 2), Compression::fast());
    encoder
        .write_all(data)
        .and_then(|_| encoder.finish())
        .map_err(|e| StreamError::EncodeFailure {
            message: format!("Deflate failed: {}", e),
        })
}

/// Inflate at most `limit` bytes; a payload that would grow past it is a
/// `FormatMismatch`.
fn inflate(data: &[u8], limit: usize) -> Result<Vec<u8>> {
    let ceiling = data.len().saturating_mul(MAX_INFLATE_RATIO).max(64);
    let mut out = Vec::with_capacity(limit.min(ceiling));
    DeflateDecoder::new(data)
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| StreamError::DecodeFailure {
            message: format!("Inflate failed: {}", e),
        })?;
    if out.len() > limit {
        return Err(StreamError::mismatch(
            format!("at most {} inflated bytes", limit),
            "a larger payload",
        ));
    }
    Ok(out)
}

fn len_field(len: usize, what: &str) -> Result<[u8; 4]> {
    i32::try_from(len)
        .map(i32::to_le_bytes)
        .map_err(|_| StreamError::EncodeFailure {
            message: format!("{} of {} bytes does not fit the length field", what, len),
        })
}

fn read_i32(bytes: &[u8], offset: usize) -> Option<i32> {
    let field = bytes.get(offset..offset + 4)?;
    Some(i32::from_le_bytes([field[0], field[1], field[2], field[3]]))
}

/// Compress raw interleaved bytes wrapped in a lossless container.
pub fn encode_stream(raw: &[u8], format: &AudioFormat) -> Result<Vec<u8>> {
    let container = wav::encode_raw(raw, format)?;
    let compressed = deflate(&container)?;

    let mut out = Vec::with_capacity(LENGTH_PREFIX + compressed.len());
    out.extend_from_slice(&len_field(compressed.len(), "compressed payload")?);
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Compress a float sample array behind a 16-byte format header.
pub fn encode_samples(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let raw = pcm::f32_to_le_bytes(samples);
    let compressed = deflate(&raw)?;

    let mut out = Vec::with_capacity(ARCHIVE_HEADER + compressed.len());
    out.extend_from_slice(&len_field(raw.len(), "sample payload")?);
    out.extend_from_slice(&len_field(samples.len(), "sample count")?);
    out.extend_from_slice(&len_field(sample_rate as usize, "sample rate")?);
    out.extend_from_slice(&(channels as i32).to_le_bytes());
    out.extend_from_slice(&compressed);
    Ok(out)
}

/// Decode either layout.
///
/// The byte-stream layout is recognised when the length prefix matches the
/// remaining payload exactly; anything else must carry a consistent
/// sample-array header.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let declared = read_i32(bytes, 0)
        .ok_or_else(|| StreamError::mismatch("a 4-byte length prefix", format!("{} bytes", bytes.len())))?;
    let payload = &bytes[LENGTH_PREFIX..];

    if usize::try_from(declared).is_ok_and(|len| len == payload.len()) {
        let container = inflate(payload, payload.len().saturating_mul(MAX_INFLATE_RATIO))?;
        return wav::decode(&container);
    }

    if bytes.len() >= ARCHIVE_HEADER {
        return decode_samples(bytes);
    }

    Err(StreamError::mismatch(
        format!("{} compressed bytes", declared),
        format!("{} bytes", payload.len()),
    ))
}

fn decode_samples(bytes: &[u8]) -> Result<DecodedAudio> {
    let field = |offset| {
        read_i32(bytes, offset)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| StreamError::mismatch("non-negative header fields", "negative field"))
    };
    let byte_len = field(0)?;
    let sample_count = field(4)?;
    let sample_rate = field(8)?;
    let channels = field(12)?;

    if sample_count.checked_mul(4) != Some(byte_len) {
        return Err(StreamError::mismatch(
            format!("{} payload bytes for {} samples", sample_count.saturating_mul(4), sample_count),
            format!("{} declared bytes", byte_len),
        ));
    }
    let channels = u16::try_from(channels)
        .ok()
        .filter(|&c| c > 0)
        .ok_or_else(|| StreamError::mismatch("1..=65535 channels", format!("{}", channels)))?;
    if sample_count % channels as usize != 0 {
        return Err(StreamError::mismatch(
            format!("a multiple of {} samples", channels),
            format!("{} samples", sample_count),
        ));
    }

    let raw = inflate(&bytes[ARCHIVE_HEADER..], byte_len)?;
    if raw.len() != byte_len {
        return Err(StreamError::mismatch(
            format!("{} inflated bytes", byte_len),
            format!("{} bytes", raw.len()),
        ));
    }

    Ok(DecodedAudio {
        samples: pcm::f32_from_le_bytes(&raw),
        sample_count: sample_count / channels as usize,
        sample_rate: sample_rate as u32,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::SampleFormat;

    #[test]
    fn stream_layout_prefix_is_compressed_length() {
        let format = AudioFormat::new(48000, 1, SampleFormat::I16);
        let raw = vec![0u8; 96000];
        let bytes = encode_stream(&raw, &format).unwrap();

        let declared = read_i32(&bytes, 0).unwrap() as usize;
        assert_eq!(declared, bytes.len() - 4);
        // Silence compresses well below the container size.
        assert!(bytes.len() < 96000 / 10);
    }

    #[test]
    fn stream_layout_round_trip_keeps_metadata() {
        let format = AudioFormat::new(48000, 1, SampleFormat::I16);
        let bytes = encode_stream(&vec![0u8; 96000], &format).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_count, 48000);
        assert!(decoded.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn sample_layout_header_fields() {
        let samples = vec![0.25f32; 8];
        let bytes = encode_samples(&samples, 22050, 2).unwrap();

        assert_eq!(read_i32(&bytes, 0), Some(32));
        assert_eq!(read_i32(&bytes, 4), Some(8));
        assert_eq!(read_i32(&bytes, 8), Some(22050));
        assert_eq!(read_i32(&bytes, 12), Some(2));
    }

    #[test]
    fn sample_layout_round_trip_is_bit_exact() {
        let samples: Vec<f32> = (0..4800).map(|i| ((i as f32) * 0.003).cos() * 0.6).collect();
        let bytes = encode_samples(&samples, 48000, 2).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.samples, samples);
        assert_eq!(decoded.sample_count, 2400);
        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 2);
    }

    #[test]
    fn truncated_stream_is_rejected() {
        let format = AudioFormat::new(16000, 1, SampleFormat::I16);
        let mut bytes = encode_stream(&vec![7u8; 3200], &format).unwrap();
        bytes.truncate(bytes.len() - 3);

        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn inconsistent_sample_header_is_format_mismatch() {
        let mut bytes = encode_samples(&[0.5f32; 4], 48000, 1).unwrap();
        // Claim one more sample than the payload carries.
        bytes[4..8].copy_from_slice(&5i32.to_le_bytes());

        assert!(matches!(decode(&bytes), Err(StreamError::FormatMismatch { .. })));
    }

    #[test]
    fn forged_huge_header_fails_without_allocating_it() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0x7FFF_FFFCi32.to_le_bytes());
        bytes.extend_from_slice(&0x1FFF_FFFFi32.to_le_bytes());
        bytes.extend_from_slice(&48000i32.to_le_bytes());
        bytes.extend_from_slice(&1i32.to_le_bytes());
        // Final stored block with no data.
        bytes.extend_from_slice(&[0x01, 0x00, 0x00, 0xff, 0xff]);
        assert_eq!(bytes.len(), 21);

        assert!(matches!(decode(&bytes), Err(StreamError::FormatMismatch { .. })));
    }

    #[test]
    fn payload_larger_than_declared_is_format_mismatch() {
        let mut bytes = encode_samples(&[0.5f32; 64], 48000, 1).unwrap();
        // Declare fewer samples than the compressed payload holds.
        bytes[0..4].copy_from_slice(&16i32.to_le_bytes());
        bytes[4..8].copy_from_slice(&4i32.to_le_bytes());

        assert!(matches!(decode(&bytes), Err(StreamError::FormatMismatch { .. })));
    }

    #[test]
    fn too_short_input_is_format_mismatch() {
        assert!(matches!(decode(&[1, 2]), Err(StreamError::FormatMismatch { .. })));
        assert!(matches!(
            decode(&[9, 0, 0, 0, 1]),
            Err(StreamError::FormatMismatch { .. })
        ));
    }
}
