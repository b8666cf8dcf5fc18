//! Lossy codec: MP3 via LAME for encoding and symphonia for decoding.
//!
//! Both ends are treated as black boxes. The encoder takes 16-bit
//! interleaved PCM (mono or stereo); the decoder recovers sample rate,
//! channel count and sample count from the stream itself.
//!
//! Frames carry no LAME/Xing info tag, so the decoder cannot trim encoder
//! delay and padding. The decoded length is the input length rounded up to
//! whole MP3 frames plus the priming delay; even an empty input decodes to
//! one frame of silence.

use crate::codec::{DecodedAudio, LossyQuality, pcm};
use crate::error::{Result, StreamError};
use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use std::io::Cursor;

/// Worst-case size of the bytes LAME emits on flush.
const FLUSH_RESERVE: usize = 7200;

impl LossyQuality {
    fn lame_settings(self) -> (Bitrate, Quality) {
        match self {
            LossyQuality::Medium => (Bitrate::Kbps128, Quality::Good),
            LossyQuality::Standard => (Bitrate::Kbps192, Quality::Good),
            LossyQuality::Extreme => (Bitrate::Kbps256, Quality::NearBest),
            LossyQuality::Insane => (Bitrate::Kbps320, Quality::Best),
        }
    }
}

fn build_error(what: &str, e: impl std::fmt::Debug) -> StreamError {
    StreamError::EncodeFailure {
        message: format!("LAME rejected {}: {:?}", what, e),
    }
}

/// Encode 16-bit interleaved PCM into an MP3 stream.
pub fn encode(samples: &[i16], sample_rate: u32, channels: u16, quality: LossyQuality) -> Result<Vec<u8>> {
    if !(1..=2).contains(&channels) {
        return Err(StreamError::mismatch("mono or stereo input", format!("{} channels", channels)));
    }
    if samples.len() % channels as usize != 0 {
        return Err(StreamError::mismatch(
            format!("a multiple of {} samples", channels),
            format!("{} samples", samples.len()),
        ));
    }

    let (bitrate, lame_quality) = quality.lame_settings();
    let mut builder = Builder::new().ok_or_else(|| StreamError::EncodeFailure {
        message: "Failed to allocate LAME encoder".to_string(),
    })?;
    builder
        .set_num_channels(channels as u8)
        .map_err(|e| build_error("channel count", e))?;
    builder
        .set_sample_rate(sample_rate)
        .map_err(|e| build_error("sample rate", e))?;
    builder.set_brate(bitrate).map_err(|e| build_error("bitrate", e))?;
    builder
        .set_quality(lame_quality)
        .map_err(|e| build_error("quality", e))?;
    let mut encoder = builder.build().map_err(|e| build_error("configuration", e))?;

    let mut out = Vec::new();
    out.reserve(mp3lame_encoder::max_required_buffer_size(samples.len()));
    let encoded = if channels == 1 {
        encoder.encode_to_vec(MonoPcm(samples), &mut out)
    } else {
        encoder.encode_to_vec(InterleavedPcm(samples), &mut out)
    };
    encoded.map_err(|e| StreamError::EncodeFailure {
        message: format!("LAME encode failed: {:?}", e),
    })?;

    out.reserve(FLUSH_RESERVE);
    encoder
        .flush_to_vec::<FlushNoGap>(&mut out)
        .map_err(|e| StreamError::EncodeFailure {
            message: format!("LAME flush failed: {:?}", e),
        })?;

    Ok(out)
}

fn decode_error(context: &str, e: SymphoniaError) -> StreamError {
    StreamError::DecodeFailure {
        message: format!("{}: {}", context, e),
    }
}

/// Decode a complete MP3 stream to normalised float samples.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");

    let format_options = FormatOptions {
        enable_gapless: true,
        ..Default::default()
    };
    let probed = symphonia::default::get_probe()
        .format(&hint, source, &format_options, &MetadataOptions::default())
        .map_err(|e| decode_error("Unrecognised lossy stream", e))?;
    let mut format = probed.format;

    let track = format.default_track().ok_or_else(|| StreamError::DecodeFailure {
        message: "Lossy stream has no audio track".to_string(),
    })?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map(|c| c.count() as u16).unwrap_or(0);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error("No decoder for lossy stream", e))?;

    let mut pcm16: Vec<i16> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error("Failed to read lossy packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut buffer = SampleBuffer::<i16>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                pcm16.extend_from_slice(buffer.samples());
                sample_rate = spec.rate;
                channels = spec.channels.count() as u16;
            }
            // Corrupt frames are skipped, as the decoder recovers on the next one.
            Err(SymphoniaError::DecodeError(msg)) => {
                log::debug!("Skipping undecodable lossy frame: {}", msg);
            }
            Err(e) => return Err(decode_error("Lossy decode failed", e)),
        }
    }

    if channels == 0 || sample_rate == 0 {
        return Err(StreamError::DecodeFailure {
            message: "Lossy stream carries no format information".to_string(),
        });
    }

    let sample_count = pcm16.len() / channels as usize;
    Ok(DecodedAudio {
        samples: pcm16.into_iter().map(pcm::i16_to_f32).collect(),
        sample_count,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(frames: usize, channels: u16, sample_rate: u32) -> Vec<i16> {
        (0..frames)
            .flat_map(|i| {
                let t = i as f32 / sample_rate as f32;
                let v = (t * 440.0 * std::f32::consts::TAU).sin() * 0.5;
                std::iter::repeat_n(pcm::f32_to_i16(v), channels as usize)
            })
            .collect()
    }

    #[test]
    fn stereo_round_trip_recovers_format() {
        let input = tone(22050, 2, 44100);
        let bytes = encode(&input, 44100, 2, LossyQuality::Standard).unwrap();
        assert!(!bytes.is_empty());
        assert!(bytes.len() < input.len() * 2);

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded.sample_rate, 44100);
        assert_eq!(decoded.channels, 2);
        // Encoder priming and frame padding may add up to a couple of frames.
        assert!(decoded.sample_count + 1152 >= 22050, "got {}", decoded.sample_count);
        assert!(decoded.sample_count <= 22050 + 3 * 1152, "got {}", decoded.sample_count);
        assert_eq!(decoded.samples.len(), decoded.sample_count * 2);
    }

    #[test]
    fn mono_round_trip_recovers_format() {
        let input = tone(48000, 1, 48000);
        let bytes = encode(&input, 48000, 1, LossyQuality::Medium).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.sample_rate, 48000);
        assert_eq!(decoded.channels, 1);
        assert!(decoded.samples.iter().all(|s| (-1.01..=1.01).contains(s)));
    }

    #[test]
    fn empty_input_decodes_to_padding_silence() {
        let bytes = encode(&[], 44100, 2, LossyQuality::Standard).unwrap();
        let decoded = decode(&bytes).unwrap();

        assert_eq!(decoded.channels, 2);
        assert!(decoded.sample_count > 0);
        assert!(decoded.sample_count <= 2 * 1152, "got {}", decoded.sample_count);
        assert!(decoded.samples.iter().all(|s| s.abs() < 0.01));
    }

    #[test]
    fn more_than_two_channels_is_rejected() {
        let result = encode(&[0i16; 12], 48000, 6, LossyQuality::Standard);
        assert!(matches!(result, Err(StreamError::FormatMismatch { .. })));
    }

    #[test]
    fn garbage_does_not_decode() {
        let garbage: Vec<u8> = (0..256).map(|i| (i * 31 % 251) as u8).collect();
        assert!(decode(&garbage).is_err());
    }
}
