//! Capture pipeline: device bytes -> fixed-size frames -> encoder station ->
//! frame queue.

use crate::capture::accumulator::FrameAccumulator;
use crate::capture::encoder::{
    CodecEncoder, Destination, EncodeJob, EncodedFrame, EncoderSettings, EncoderStation, FrameEncoder,
};
use crate::capture::events::{CaptureEvent, EventBus};
use crate::capture::source::{AudioInput, DataCallback};
use crate::codec::AudioFormat;
use crate::config::CaptureConfig;
use crate::error::{Result, StreamError};
use crate::station::{LogReporter, StationRunner};
use crossbeam_channel::{Receiver, Sender};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

/// State shared with the device callback.
#[derive(Debug, Default)]
struct Session {
    accumulator: FrameAccumulator,
    next_sequence: u64,
}

/// Live capture pipeline.
///
/// `play` opens the input and starts slicing its byte stream into frames of
/// `frame_duration_secs`; each frame is encoded on a dedicated worker and
/// appended to the frame queue read by [`get_frame`](Self::get_frame).
pub struct CapturePipeline<I: AudioInput, E: FrameEncoder = CodecEncoder> {
    input: I,
    config: CaptureConfig,
    state: CaptureState,
    format: Option<AudioFormat>,
    session: Arc<Mutex<Session>>,
    live_generation: Arc<AtomicU64>,
    session_generation: u64,
    job_tx: Sender<EncodeJob>,
    frame_rx: Receiver<EncodedFrame>,
    events: EventBus,
    encoder: StationRunner<EncoderStation<E>>,
}

impl<I: AudioInput> CapturePipeline<I, CodecEncoder> {
    /// Pipeline encoding with the configured codec and quality.
    pub fn new(input: I, config: &CaptureConfig) -> Self {
        let encoder = CodecEncoder::new(config.codec, config.quality);
        Self::with_encoder(input, config, encoder)
    }
}

impl<I: AudioInput, E: FrameEncoder> CapturePipeline<I, E> {
    pub fn with_encoder(input: I, config: &CaptureConfig, encoder: E) -> Self {
        let events = EventBus::new();
        let live_generation = Arc::new(AtomicU64::new(0));
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (frame_tx, frame_rx) = crossbeam_channel::unbounded();

        let station = EncoderStation::new(
            encoder,
            EncoderSettings {
                auto_compress: config.auto_compress,
                max_channels: config.max_channels,
            },
            Arc::clone(&live_generation),
            events.clone(),
        );
        let encoder = StationRunner::spawn(station, job_rx, frame_tx, Arc::new(LogReporter));

        Self {
            input,
            config: config.clone(),
            state: CaptureState::Idle,
            format: None,
            session: Arc::new(Mutex::new(Session::default())),
            live_generation,
            session_generation: 0,
            job_tx,
            frame_rx,
            events,
            encoder,
        }
    }

    /// Start capturing. Calling it while already capturing does nothing.
    ///
    /// # Errors
    /// Device and configuration errors leave the pipeline idle.
    pub fn play(&mut self) -> Result<()> {
        if self.state == CaptureState::Capturing {
            return Ok(());
        }

        let format = self.input.open()?;
        let frame_bytes = format.bytes_for_duration(self.config.frame_duration_secs);
        if frame_bytes == 0 {
            return Err(StreamError::ConfigInvalidValue {
                key: "frame_duration_secs".to_string(),
                message: format!(
                    "{}s at {} yields an empty frame",
                    self.config.frame_duration_secs, format
                ),
            });
        }

        let generation = self.live_generation.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut session = self.lock_session()?;
            session.accumulator = FrameAccumulator::new(frame_bytes);
            session.next_sequence = 0;
        }
        let cleared = self.frame_rx.try_iter().count();
        if cleared > 0 {
            log::debug!("Cleared {} frames left from the previous session", cleared);
        }

        let callback = self.frame_callback(generation, format);
        if let Err(e) = self.input.start(callback) {
            self.live_generation.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }

        self.session_generation = generation;
        self.format = Some(format);
        self.state = CaptureState::Capturing;
        log::info!(
            "Capturing {} in frames of {} bytes ({}s)",
            format,
            frame_bytes,
            self.config.frame_duration_secs
        );
        Ok(())
    }

    fn frame_callback(&self, generation: u64, format: AudioFormat) -> DataCallback {
        let session = Arc::clone(&self.session);
        let job_tx = self.job_tx.clone();
        let policy = self.config.remainder;

        Box::new(move |data: &[u8]| {
            let Ok(mut session) = session.lock() else {
                return;
            };
            session.accumulator.push(data);
            // Jobs are sent under the lock so their order matches capture order.
            while let Some(raw) = session.accumulator.next_frame(policy) {
                let job = EncodeJob {
                    generation,
                    sequence: session.next_sequence,
                    raw,
                    format,
                    destination: Destination::Queue,
                };
                session.next_sequence += 1;
                if job_tx.send(job).is_err() {
                    return;
                }
            }
        })
    }

    /// Stop capturing and release the input. Calling it while idle does nothing.
    ///
    /// Frames already queued stay readable; work still in flight is discarded.
    pub fn stop(&mut self) -> Result<()> {
        if self.state == CaptureState::Idle {
            return Ok(());
        }

        self.live_generation.fetch_add(1, Ordering::SeqCst);
        self.state = CaptureState::Idle;
        let released = self.input.stop();
        if let Ok(mut session) = self.session.lock() {
            session.accumulator.clear();
        }
        self.events.emit(CaptureEvent::Stopped);
        log::info!("Capture stopped");
        released
    }

    /// Dequeue the oldest encoded frame, if any.
    pub fn get_frame(&self) -> Option<EncodedFrame> {
        for frame in self.frame_rx.try_iter() {
            if frame.generation == self.session_generation {
                return Some(frame);
            }
            log::debug!("Skipping frame {} from an earlier session", frame.sequence());
        }
        None
    }

    /// Queue raw bytes for encoding outside the device callback.
    ///
    /// With `dir`, the result is written to the recording file in that
    /// directory and announced as [`CaptureEvent::Recorded`] instead of being
    /// queued. Disk encodes work after `stop`; queue-bound encodes require an
    /// active capture.
    ///
    /// # Errors
    /// `StreamError::NotCapturing` when no stream format is known yet.
    pub fn encode_frame(&self, raw: Vec<u8>, dir: Option<&Path>) -> Result<()> {
        let format = self.format.ok_or(StreamError::NotCapturing)?;
        let destination = match dir {
            Some(dir) => Destination::Disk(dir.to_path_buf()),
            None if self.state == CaptureState::Capturing => Destination::Queue,
            None => return Err(StreamError::NotCapturing),
        };

        let sequence = {
            let mut session = self.lock_session()?;
            let sequence = session.next_sequence;
            session.next_sequence += 1;
            sequence
        };
        let job = EncodeJob {
            generation: self.live_generation.load(Ordering::SeqCst),
            sequence,
            raw,
            format,
            destination,
        };
        self.job_tx.send(job).map_err(|_| StreamError::EncodeFailure {
            message: "Encoder station is not running".to_string(),
        })
    }

    pub fn subscribe(&self) -> Receiver<CaptureEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn is_capturing(&self) -> bool {
        self.state == CaptureState::Capturing
    }

    /// Format of the current (or most recent) capture stream.
    pub fn format(&self) -> Option<AudioFormat> {
        self.format
    }

    pub fn is_encoder_running(&self) -> bool {
        self.encoder.is_running()
    }

    fn lock_session(&self) -> Result<std::sync::MutexGuard<'_, Session>> {
        self.session.lock().map_err(|e| StreamError::AudioCapture {
            message: format!("Capture session lock poisoned: {}", e),
        })
    }
}

impl<I: AudioInput, E: FrameEncoder> Drop for CapturePipeline<I, E> {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            log::warn!("Failed to stop capture on drop: {}", e);
        }
    }
}
