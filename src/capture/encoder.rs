//! Encoding station: turns raw captured frames into encoded frames off the
//! capture thread.

use crate::capture::events::{CaptureEvent, EventBus};
use crate::codec::{self, AudioFormat, Codec, LossyQuality};
use crate::error::Result;
use crate::station::{Station, StationError};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Seam between the encoding station and the codec.
pub trait FrameEncoder: Send + 'static {
    /// Encode raw interleaved bytes described by `format`.
    fn encode(&mut self, raw: &[u8], format: &AudioFormat) -> Result<Vec<u8>>;

    /// Encode raw bytes to a file inside `dir`, returning its path.
    fn encode_to_disk(&mut self, raw: &[u8], format: &AudioFormat, dir: &Path) -> Result<PathBuf>;
}

/// [`FrameEncoder`] backed by the codec module.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecEncoder {
    pub codec: Codec,
    pub quality: LossyQuality,
}

impl CodecEncoder {
    pub fn new(codec: Codec, quality: LossyQuality) -> Self {
        Self { codec, quality }
    }
}

impl FrameEncoder for CodecEncoder {
    fn encode(&mut self, raw: &[u8], format: &AudioFormat) -> Result<Vec<u8>> {
        codec::encode_bytes(raw, format, self.codec, self.quality)
    }

    fn encode_to_disk(&mut self, raw: &[u8], format: &AudioFormat, dir: &Path) -> Result<PathBuf> {
        codec::encode_to_disk(raw, format, self.codec, self.quality, dir)
    }
}

/// Where an encode result goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The pipeline's frame queue.
    Queue,
    /// A recording file in this directory.
    Disk(PathBuf),
}

/// One unit of work for the [`EncoderStation`].
#[derive(Debug, Clone)]
pub struct EncodeJob {
    pub generation: u64,
    pub sequence: u64,
    pub raw: Vec<u8>,
    pub format: AudioFormat,
    pub destination: Destination,
}

/// An immutable encoded frame taken from the frame queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedFrame {
    pub(crate) generation: u64,
    sequence: u64,
    bytes: Vec<u8>,
}

impl EncodedFrame {
    pub(crate) fn new(generation: u64, sequence: u64, bytes: Vec<u8>) -> Self {
        Self {
            generation,
            sequence,
            bytes,
        }
    }

    /// Capture order within the session that produced the frame.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Encoder behaviour knobs taken from the capture configuration.
#[derive(Debug, Clone, Copy)]
pub struct EncoderSettings {
    /// When false, queue-bound frames pass through raw.
    pub auto_compress: bool,
    /// Channel count above which frames are downmixed before encoding.
    pub max_channels: u16,
}

/// Station that encodes frames one at a time.
///
/// Queue-bound jobs from a stopped session are dropped; disk jobs always
/// run to completion.
pub struct EncoderStation<E: FrameEncoder> {
    encoder: E,
    settings: EncoderSettings,
    live_generation: Arc<AtomicU64>,
    events: EventBus,
}

impl<E: FrameEncoder> EncoderStation<E> {
    pub fn new(
        encoder: E,
        settings: EncoderSettings,
        live_generation: Arc<AtomicU64>,
        events: EventBus,
    ) -> Self {
        Self {
            encoder,
            settings,
            live_generation,
            events,
        }
    }

    fn is_stale(&self, generation: u64) -> bool {
        generation != self.live_generation.load(Ordering::SeqCst)
    }

    fn downmix<'a>(&self, raw: &'a [u8], format: &AudioFormat) -> (Cow<'a, [u8]>, AudioFormat) {
        let max = self.settings.max_channels;
        if format.channels <= max {
            return (Cow::Borrowed(raw), *format);
        }
        log::debug!("Downmixing {} channels to {}", format.channels, max);
        (
            codec::reduce_channels(raw, format.bytes_per_sample(), format.channels as usize, max as usize),
            format.with_channels(max),
        )
    }

    fn fail(&self, sequence: u64, error: impl std::fmt::Display) -> StationError {
        let message = format!("frame {}: {}", sequence, error);
        self.events.emit(CaptureEvent::EncodeFailed(message.clone()));
        StationError::Recoverable(message)
    }
}

impl<E: FrameEncoder> Station for EncoderStation<E> {
    type Input = EncodeJob;
    type Output = EncodedFrame;

    fn process(&mut self, job: EncodeJob) -> std::result::Result<Option<EncodedFrame>, StationError> {
        if let Destination::Disk(dir) = &job.destination {
            let (raw, format) = self.downmix(&job.raw, &job.format);
            let path = self
                .encoder
                .encode_to_disk(&raw, &format, dir)
                .map_err(|e| self.fail(job.sequence, e))?;
            self.events.emit(CaptureEvent::Recorded(path));
            return Ok(None);
        }

        if self.is_stale(job.generation) {
            log::debug!("Dropping frame {} from a stopped session", job.sequence);
            return Ok(None);
        }

        let bytes = if self.settings.auto_compress {
            let (raw, format) = self.downmix(&job.raw, &job.format);
            self.encoder
                .encode(&raw, &format)
                .map_err(|e| self.fail(job.sequence, e))?
        } else {
            job.raw
        };

        // Stop may have landed while encoding.
        if self.is_stale(job.generation) {
            log::debug!("Discarding frame {} encoded after stop", job.sequence);
            return Ok(None);
        }

        Ok(Some(EncodedFrame::new(job.generation, job.sequence, bytes)))
    }

    fn name(&self) -> &'static str {
        "encoder"
    }

    fn delivered(&mut self) {
        self.events.emit(CaptureEvent::FrameReady);
    }
}
