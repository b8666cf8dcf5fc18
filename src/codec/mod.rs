//! Frame codecs: conversion between interleaved PCM and the three wire formats.
//!
//! - [`Codec::Lossless`]: WAV container, see [`wav`]
//! - [`Codec::CompressedLossless`]: deflated WAV container or float array, see [`deflate`]
//! - [`Codec::Lossy`]: MP3 stream, see [`mp3`]
//!
//! Every encoded frame is self-describing: [`decode`] needs only the bytes
//! and the codec that produced them.

pub mod deflate;
pub mod mp3;
pub mod pcm;
pub mod wav;

use crate::defaults::RECORDING_FILE_STEM;
use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Wire format selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Codec {
    Lossless,
    CompressedLossless,
    /// Not sample-exact: each frame decodes with the encoder's priming
    /// delay in front and padding up to a whole MP3 frame (1152 samples per
    /// channel) behind, so consecutive frames play with short gaps between
    /// them and the playback clock counts the padding too.
    #[default]
    Lossy,
}

impl Codec {
    /// File extension used when a frame is written to disk.
    pub fn file_extension(self) -> &'static str {
        match self {
            Codec::Lossless => "wav",
            Codec::CompressedLossless => "wav.deflate",
            Codec::Lossy => "mp3",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Codec::Lossless => "lossless",
            Codec::CompressedLossless => "compressed_lossless",
            Codec::Lossy => "lossy",
        };
        f.write_str(name)
    }
}

impl FromStr for Codec {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lossless" | "wav" => Ok(Codec::Lossless),
            "compressed_lossless" | "zip" | "deflate" => Ok(Codec::CompressedLossless),
            "lossy" | "mp3" => Ok(Codec::Lossy),
            other => Err(StreamError::ConfigInvalidValue {
                key: "codec".to_string(),
                message: format!(
                    "unknown codec '{}' (expected lossless, compressed_lossless or lossy)",
                    other
                ),
            }),
        }
    }
}

/// Encoder preset for [`Codec::Lossy`], named after the LAME presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossyQuality {
    Medium,
    #[default]
    Standard,
    Extreme,
    Insane,
}

/// Sample encoding of raw interleaved bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Signed 16-bit little-endian.
    I16,
    /// IEEE 754 single precision little-endian.
    F32,
}

impl SampleFormat {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::I16 => 2,
            SampleFormat::F32 => 4,
        }
    }
}

/// Layout of raw interleaved PCM bytes.
///
/// Block align and byte rate are derived, so they always agree with the
/// channel count, bit depth and sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub sample_format: SampleFormat,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, sample_format: SampleFormat) -> Self {
        Self {
            sample_rate,
            channels,
            sample_format,
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.sample_format.bytes_per_sample() as u16 * 8
    }

    pub fn bytes_per_sample(&self) -> usize {
        self.sample_format.bytes_per_sample()
    }

    /// Bytes per interleaved sample frame: `channels * bits_per_sample / 8`.
    pub fn block_align(&self) -> usize {
        self.channels as usize * self.bytes_per_sample()
    }

    /// `block_align * sample_rate`.
    pub fn bytes_per_second(&self) -> usize {
        self.block_align() * self.sample_rate as usize
    }

    /// Same format with a different channel count.
    pub fn with_channels(&self, channels: u16) -> Self {
        Self { channels, ..*self }
    }

    /// Whole-block byte length of `seconds` of audio.
    pub fn bytes_for_duration(&self, seconds: f32) -> usize {
        let frames = (seconds as f64 * self.sample_rate as f64).round().max(0.0) as usize;
        frames * self.block_align()
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}ch/{}Hz/{}-bit {}",
            self.channels,
            self.sample_rate,
            self.bits_per_sample(),
            match self.sample_format {
                SampleFormat::I16 => "int",
                SampleFormat::F32 => "float",
            }
        )
    }
}

/// Result of decoding one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    /// Interleaved samples normalised to [-1, 1].
    pub samples: Vec<f32>,
    /// Samples per channel.
    pub sample_count: usize,
    pub sample_rate: u32,
    pub channels: u16,
}

fn check_interleaved(len: usize, channels: u16) -> Result<()> {
    if channels == 0 || len % channels as usize != 0 {
        return Err(StreamError::mismatch(
            format!("a whole number of {}-channel frames", channels),
            format!("{} samples", len),
        ));
    }
    Ok(())
}

/// Encode a float sample array.
///
/// Lossless quantises to 16 bits; compressed lossless keeps the floats
/// bit-exact behind the 16-byte sample-array header.
pub fn encode(
    pcm: &[f32],
    sample_rate: u32,
    channels: u16,
    codec: Codec,
    quality: LossyQuality,
) -> Result<Vec<u8>> {
    check_interleaved(pcm.len(), channels)?;
    match codec {
        Codec::Lossless => wav::encode_f32_quantised(pcm, sample_rate, channels),
        Codec::CompressedLossless => deflate::encode_samples(pcm, sample_rate, channels),
        Codec::Lossy => {
            let pcm16: Vec<i16> = pcm.iter().map(|&s| pcm::f32_to_i16(s)).collect();
            mp3::encode(&pcm16, sample_rate, channels, quality)
        }
    }
}

/// Encode raw interleaved device bytes described by `format`.
pub fn encode_bytes(
    raw: &[u8],
    format: &AudioFormat,
    codec: Codec,
    quality: LossyQuality,
) -> Result<Vec<u8>> {
    match codec {
        Codec::Lossless => wav::encode_raw(raw, format),
        Codec::CompressedLossless => deflate::encode_stream(raw, format),
        Codec::Lossy => {
            check_interleaved(raw.len() / format.bytes_per_sample(), format.channels)?;
            let pcm16 = match format.sample_format {
                SampleFormat::I16 => pcm::i16_from_le_bytes(raw),
                SampleFormat::F32 => pcm::f32_bytes_to_i16(raw),
            };
            mp3::encode(&pcm16, format.sample_rate, format.channels, quality)
        }
    }
}

/// Encode raw bytes straight to `<dir>/recorded_audio.<ext>` and return the path.
pub fn encode_to_disk(
    raw: &[u8],
    format: &AudioFormat,
    codec: Codec,
    quality: LossyQuality,
    dir: &Path,
) -> Result<PathBuf> {
    let bytes = encode_bytes(raw, format, codec, quality)?;
    let path = recording_path(dir, codec);
    std::fs::write(&path, bytes)?;
    log::info!("Encoded {} bytes of audio to {}", raw.len(), path.display());
    Ok(path)
}

/// Fixed on-disk location for a recording in `dir`.
pub fn recording_path(dir: &Path, codec: Codec) -> PathBuf {
    dir.join(format!("{}.{}", RECORDING_FILE_STEM, codec.file_extension()))
}

/// Decode one encoded frame.
pub fn decode(bytes: &[u8], codec: Codec) -> Result<DecodedAudio> {
    match codec {
        Codec::Lossless => wav::decode(bytes),
        Codec::CompressedLossless => deflate::decode(bytes),
        Codec::Lossy => mp3::decode(bytes),
    }
}

/// Keep only the first `new_channels` channels of every sample frame.
///
/// Returns the input untouched when `channels <= new_channels`. Each slot is
/// `bytes_per_sample` wide; a trailing partial frame is dropped.
pub fn reduce_channels(
    buffer: &[u8],
    bytes_per_sample: usize,
    channels: usize,
    new_channels: usize,
) -> Cow<'_, [u8]> {
    if channels <= new_channels || bytes_per_sample == 0 {
        return Cow::Borrowed(buffer);
    }

    let in_block = bytes_per_sample * channels;
    let out_block = bytes_per_sample * new_channels;
    let mut reduced = Vec::with_capacity(buffer.len() / channels * new_channels);
    for frame in buffer.chunks_exact(in_block) {
        reduced.extend_from_slice(&frame[..out_block]);
    }
    Cow::Owned(reduced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn format_invariants_hold() {
        let format = AudioFormat::new(48000, 2, SampleFormat::F32);
        assert_eq!(format.bits_per_sample(), 32);
        assert_eq!(format.block_align(), 8);
        assert_eq!(format.bytes_per_second(), 384000);

        let format = AudioFormat::new(44100, 1, SampleFormat::I16);
        assert_eq!(format.block_align(), 2);
        assert_eq!(format.bytes_per_second(), 88200);
    }

    #[test]
    fn bytes_for_duration_is_block_aligned() {
        let format = AudioFormat::new(44100, 6, SampleFormat::F32);
        let bytes = format.bytes_for_duration(0.333);
        assert_eq!(bytes % format.block_align(), 0);
        assert_eq!(bytes, 14685 * 24);
    }

    #[test]
    fn codec_parses_names_and_aliases() {
        assert_eq!("lossless".parse::<Codec>().unwrap(), Codec::Lossless);
        assert_eq!("ZIP".parse::<Codec>().unwrap(), Codec::CompressedLossless);
        assert_eq!(
            "compressed-lossless".parse::<Codec>().unwrap(),
            Codec::CompressedLossless
        );
        assert_eq!("mp3".parse::<Codec>().unwrap(), Codec::Lossy);
        assert!("flac".parse::<Codec>().is_err());
    }

    #[test]
    fn codec_display_matches_config_names() {
        for codec in [Codec::Lossless, Codec::CompressedLossless, Codec::Lossy] {
            assert_eq!(codec.to_string().parse::<Codec>().unwrap(), codec);
        }
    }

    #[test]
    fn encode_rejects_ragged_interleaving() {
        let result = encode(&[0.0; 5], 48000, 2, Codec::Lossless, LossyQuality::Standard);
        assert!(matches!(result, Err(StreamError::FormatMismatch { .. })));
    }

    #[test]
    fn silence_lossless_scenario() {
        let pcm = vec![0.0f32; 48000];
        let bytes = encode(&pcm, 48000, 1, Codec::Lossless, LossyQuality::Standard).unwrap();
        let decoded = decode(&bytes, Codec::Lossless).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.sample_count, 48000);
        assert!(bytes[bytes.len() - 96000..].iter().all(|&b| b == 0));
    }

    #[test]
    fn silence_compressed_stream_scenario() {
        let format = AudioFormat::new(48000, 1, SampleFormat::I16);
        let raw = pcm::i16_to_le_bytes(&vec![0i16; 48000]);
        let bytes = encode_bytes(&raw, &format, Codec::CompressedLossless, LossyQuality::Standard).unwrap();
        let decoded = decode(&bytes, Codec::CompressedLossless).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decoded.samples, vec![0.0f32; 48000]);
    }

    #[test]
    fn float_device_bytes_round_trip_every_lossless_path() {
        let samples: Vec<f32> = (0..2000).map(|i| ((i as f32) * 0.02).sin() * 0.9).collect();
        let format = AudioFormat::new(48000, 2, SampleFormat::F32);
        let raw = pcm::f32_to_le_bytes(&samples);

        for codec in [Codec::Lossless, Codec::CompressedLossless] {
            let bytes = encode_bytes(&raw, &format, codec, LossyQuality::Standard).unwrap();
            let decoded = decode(&bytes, codec).unwrap();
            assert_eq!(decoded.samples, samples, "{codec}");
            assert_eq!(decoded.sample_count, 1000);
        }
    }

    #[test]
    fn float_array_round_trip_compressed_is_bit_exact() {
        let samples: Vec<f32> = (0..300).map(|i| i as f32 / 300.0 - 0.5).collect();
        let bytes = encode(&samples, 16000, 3, Codec::CompressedLossless, LossyQuality::Standard).unwrap();
        let decoded = decode(&bytes, Codec::CompressedLossless).unwrap();

        assert_eq!(decoded.samples, samples);
        assert_eq!(decoded.channels, 3);
        assert_eq!(decoded.sample_count, 100);
    }

    #[test]
    fn lossy_float_bytes_round_trip_keeps_format() {
        let samples: Vec<f32> = (0..9600).map(|i| ((i as f32) * 0.05).sin() * 0.3).collect();
        let format = AudioFormat::new(48000, 2, SampleFormat::F32);
        let bytes = encode_bytes(
            &pcm::f32_to_le_bytes(&samples),
            &format,
            Codec::Lossy,
            LossyQuality::Standard,
        )
        .unwrap();
        let decoded = decode(&bytes, Codec::Lossy).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 2);
        assert!(decoded.sample_count > 0);
    }

    #[test]
    fn encode_to_disk_writes_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let format = AudioFormat::new(8000, 1, SampleFormat::I16);
        let raw = pcm::i16_to_le_bytes(&[1, 2, 3, 4]);

        let path = encode_to_disk(&raw, &format, Codec::Lossless, LossyQuality::Standard, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("recorded_audio.wav"));

        let decoded = decode(&std::fs::read(&path).unwrap(), Codec::Lossless).unwrap();
        assert_eq!(decoded.sample_count, 4);
    }

    #[test]
    fn reduce_channels_is_noop_when_not_needed() {
        let data = vec![1u8, 2, 3, 4];
        assert!(matches!(reduce_channels(&data, 2, 2, 2), Cow::Borrowed(_)));
        assert!(matches!(reduce_channels(&data, 2, 1, 2), Cow::Borrowed(_)));
    }

    #[test]
    fn reduce_channels_keeps_leading_channels() {
        // Two frames of three 2-byte channels.
        let data = vec![1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6];
        let reduced = reduce_channels(&data, 2, 3, 2);
        assert_eq!(reduced.as_ref(), &[1, 1, 2, 2, 4, 4, 5, 5]);
    }

    proptest! {
        #[test]
        fn reduce_channels_length_and_content(
            frames in 0usize..64,
            channels in 1usize..8,
            new_channels in 1usize..8,
            bytes_per_sample in prop::sample::select(vec![1usize, 2, 4]),
            seed in any::<u8>(),
        ) {
            let len = frames * channels * bytes_per_sample;
            let data: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect();
            let reduced = reduce_channels(&data, bytes_per_sample, channels, new_channels);

            if channels <= new_channels {
                prop_assert_eq!(reduced.as_ref(), data.as_slice());
            } else {
                prop_assert_eq!(reduced.len(), data.len() * new_channels / channels);
                for f in 0..frames {
                    for c in 0..new_channels {
                        let src = (f * channels + c) * bytes_per_sample;
                        let dst = (f * new_channels + c) * bytes_per_sample;
                        prop_assert_eq!(
                            &reduced[dst..dst + bytes_per_sample],
                            &data[src..src + bytes_per_sample]
                        );
                    }
                }
            }
        }
    }
}
