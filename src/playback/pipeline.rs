//! Playback pipeline: frame queue -> decoder station -> renderer.

use crate::capture::{AudioInput, CaptureEvent, CapturePipeline, FrameEncoder};
use crate::config::PlaybackConfig;
use crate::error::{Result, StreamError};
use crate::playback::decoder::{CodecDecoder, DecodeCompletion, DecodeJob, DecoderStation, FrameDecoder};
use crate::playback::renderer::{ClockState, RenderHandle, RenderOutcome, Renderer};
use crate::station::{LogReporter, StationRunner};
use crossbeam_channel::{Receiver, Sender};
use std::collections::VecDeque;
use std::sync::Arc;

/// Decodes queued frames one at a time and feeds the renderer in order.
///
/// Drive it by calling [`update`](Self::update) at a steady cadence; the
/// output device pulls audio through [`render_handle`](Self::render_handle).
pub struct PlaybackPipeline<D: FrameDecoder = CodecDecoder> {
    config: PlaybackConfig,
    pending: VecDeque<(u64, Vec<u8>)>,
    next_sequence: u64,
    in_flight: Option<u64>,
    /// Completions below this sequence predate the last reset.
    accept_from: u64,
    job_tx: Sender<DecodeJob>,
    done_rx: Receiver<DecodeCompletion>,
    renderer: RenderHandle,
    decoder: StationRunner<DecoderStation<D>>,
}

impl PlaybackPipeline<CodecDecoder> {
    /// Pipeline decoding with the configured codec.
    pub fn new(config: &PlaybackConfig) -> Self {
        Self::with_decoder(config, CodecDecoder::new(config.codec))
    }
}

impl<D: FrameDecoder> PlaybackPipeline<D> {
    pub fn with_decoder(config: &PlaybackConfig, decoder: D) -> Self {
        let (job_tx, job_rx) = crossbeam_channel::unbounded();
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let decoder = StationRunner::spawn(DecoderStation::new(decoder), job_rx, done_tx, Arc::new(LogReporter));

        Self {
            config: config.clone(),
            pending: VecDeque::new(),
            next_sequence: 0,
            in_flight: None,
            accept_from: 0,
            job_tx,
            done_rx,
            renderer: RenderHandle::new(Renderer::new(config.sync_tolerance_secs)),
            decoder,
        }
    }

    /// Queue one encoded frame for decoding.
    pub fn add_frame(&mut self, bytes: Vec<u8>) {
        self.pending.push_back((self.next_sequence, bytes));
        self.next_sequence += 1;
    }

    /// One tick: collect finished decodes, then start the next one if idle.
    ///
    /// Returns how many frames were appended to the sample buffer.
    ///
    /// # Errors
    /// `StreamError::DecodeFailure` if the decoder worker is gone, including
    /// when it dies with a decode in flight.
    pub fn update(&mut self) -> Result<usize> {
        let mut appended = 0;
        for completion in self.done_rx.try_iter() {
            if self.in_flight == Some(completion.sequence) {
                self.in_flight = None;
            }
            if completion.sequence < self.accept_from {
                continue;
            }
            match completion.result {
                Ok(audio) => {
                    self.renderer
                        .with(|r| r.append(&audio.samples, audio.sample_rate, audio.channels));
                    appended += 1;
                }
                Err(e) => log::warn!("Dropping frame {}: {}", completion.sequence, e),
            }
        }

        if let Some(sequence) = self.in_flight
            && !self.decoder.is_running()
        {
            // No completion can arrive for this frame any more.
            self.in_flight = None;
            log::error!("Decoder station stopped while decoding frame {}", sequence);
            return Err(StreamError::DecodeFailure {
                message: format!("Decoder station stopped while decoding frame {}", sequence),
            });
        }

        if self.in_flight.is_none()
            && let Some((sequence, bytes)) = self.pending.pop_front()
        {
            self.job_tx
                .send(DecodeJob { sequence, bytes })
                .map_err(|_| StreamError::DecodeFailure {
                    message: "Decoder station is not running".to_string(),
                })?;
            self.in_flight = Some(sequence);
        }

        Ok(appended)
    }

    /// Move frames from a capture pipeline into the input queue.
    ///
    /// With `constant_stream`, one frame is taken per `FrameReady`; on
    /// `Stopped` every frame left in the capture queue is taken. Returns the
    /// number of frames added.
    pub fn follow<I: AudioInput, E: FrameEncoder>(
        &mut self,
        capture: &CapturePipeline<I, E>,
        events: &Receiver<CaptureEvent>,
    ) -> usize {
        let mut added = 0;
        for event in events.try_iter() {
            match event {
                CaptureEvent::FrameReady if self.config.constant_stream => {
                    if let Some(frame) = capture.get_frame() {
                        self.add_frame(frame.into_bytes());
                        added += 1;
                    }
                }
                CaptureEvent::Stopped => {
                    while let Some(frame) = capture.get_frame() {
                        self.add_frame(frame.into_bytes());
                        added += 1;
                    }
                }
                _ => {}
            }
        }
        added
    }

    pub fn set_play_position(&self, seconds: f64) {
        self.renderer.with(|r| r.set_play_position(seconds));
    }

    /// Render a block directly, waiting for the renderer if it is busy.
    pub fn render(&self, out: &mut [f32]) -> RenderOutcome {
        self.renderer.with(|r| r.render(out))
    }

    /// Handle for a device callback; never blocks.
    pub fn render_handle(&self) -> RenderHandle {
        self.renderer.clone()
    }

    /// Drop queued frames and buffered audio and rewind the clock.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.accept_from = self.next_sequence;
        self.renderer.with(Renderer::reset);
    }

    pub fn clock(&self) -> ClockState {
        self.renderer.with(|r| r.clock())
    }

    pub fn is_decoding(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Frames waiting to be decoded.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Decoded samples waiting to be rendered.
    pub fn buffered(&self) -> usize {
        self.renderer.with(|r| r.buffered())
    }

    pub fn is_decoder_running(&self) -> bool {
        self.decoder.is_running()
    }
}
