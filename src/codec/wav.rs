//! Lossless container: a standard RIFF/WAVE header followed by interleaved
//! little-endian samples, written and parsed with `hound`.

use crate::codec::pcm::{self, i16_to_f32};
use crate::codec::{AudioFormat, DecodedAudio, SampleFormat};
use crate::error::{Result, StreamError};
use std::io::Cursor;

fn wav_spec(format: &AudioFormat) -> hound::WavSpec {
    hound::WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample(),
        sample_format: match format.sample_format {
            SampleFormat::I16 => hound::SampleFormat::Int,
            SampleFormat::F32 => hound::SampleFormat::Float,
        },
    }
}

fn encode_error(e: hound::Error) -> StreamError {
    StreamError::EncodeFailure {
        message: format!("Failed to write WAV container: {}", e),
    }
}

/// Write 16-bit samples into a WAV container.
pub fn encode_i16(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let format = AudioFormat::new(sample_rate, channels, SampleFormat::I16);
    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(&format)).map_err(encode_error)?;
    for &s in samples {
        writer.write_sample(s).map_err(encode_error)?;
    }
    writer.finalize().map_err(encode_error)?;
    Ok(cursor.into_inner())
}

/// Write float samples into a WAV container, quantised to 16 bits.
pub fn encode_f32_quantised(samples: &[f32], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let quantised: Vec<i16> = samples.iter().map(|&s| pcm::f32_to_i16(s)).collect();
    encode_i16(&quantised, sample_rate, channels)
}

/// Write raw interleaved bytes verbatim under a header describing `format`.
///
/// Float bytes stay IEEE float; 16-bit bytes stay 16-bit.
pub fn encode_raw(raw: &[u8], format: &AudioFormat) -> Result<Vec<u8>> {
    let block_align = format.block_align();
    if block_align == 0 || raw.len() % block_align != 0 {
        return Err(StreamError::mismatch(
            format!("a multiple of {} bytes", block_align),
            format!("{} bytes", raw.len()),
        ));
    }

    let mut cursor = Cursor::new(Vec::with_capacity(80 + raw.len()));
    let mut writer = hound::WavWriter::new(&mut cursor, wav_spec(format)).map_err(encode_error)?;
    match format.sample_format {
        SampleFormat::I16 => {
            for s in pcm::i16_from_le_bytes(raw) {
                writer.write_sample(s).map_err(encode_error)?;
            }
        }
        SampleFormat::F32 => {
            for s in pcm::f32_from_le_bytes(raw) {
                writer.write_sample(s).map_err(encode_error)?;
            }
        }
    }
    writer.finalize().map_err(encode_error)?;
    Ok(cursor.into_inner())
}

/// Parse a WAV container back into normalised float samples.
///
/// Trailing data that does not fill a whole sample block is dropped. A data
/// chunk that declares more samples than the payload holds is a
/// `FormatMismatch`.
pub fn decode(bytes: &[u8]) -> Result<DecodedAudio> {
    let reader = hound::WavReader::new(Cursor::new(bytes)).map_err(|e| StreamError::DecodeFailure {
        message: format!("Failed to parse WAV header: {}", e),
    })?;

    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(StreamError::mismatch("at least one channel", "0 channels"));
    }
    let frames = reader.duration() as usize;
    let whole = frames * spec.channels as usize;

    let truncated = |e: hound::Error| match e {
        hound::Error::IoError(io) => StreamError::mismatch(
            format!("{} samples declared in header", whole),
            format!("truncated payload ({})", io),
        ),
        other => StreamError::DecodeFailure {
            message: format!("Failed to read WAV samples: {}", other),
        },
    };

    let samples: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Float, 32) => reader
            .into_samples::<f32>()
            .take(whole)
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(truncated)?,
        (hound::SampleFormat::Int, 16) => reader
            .into_samples::<i16>()
            .take(whole)
            .map(|s| s.map(i16_to_f32))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(truncated)?,
        (sample_format, bits) => {
            return Err(StreamError::mismatch(
                "16-bit integer or 32-bit float samples",
                format!("{}-bit {:?}", bits, sample_format),
            ));
        }
    };

    Ok(DecodedAudio {
        samples,
        sample_count: frames,
        sample_rate: spec.sample_rate,
        channels: spec.channels,
    })
}
