//! Output device sink: drives a [`RenderHandle`] from the CPAL output callback.

use crate::capture::cpal_input::with_suppressed_stderr;
use crate::error::{Result, StreamError};
use crate::playback::renderer::{RenderHandle, RenderOutcome};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Plays whatever the render handle produces on the default output device.
///
/// Samples are emitted unconverted, so the decoded stream should match the
/// device's channel count and rate.
pub struct CpalOutput {
    stream: cpal::Stream,
    sample_rate: u32,
    channels: u16,
    underruns: Arc<AtomicU64>,
}

impl CpalOutput {
    pub fn start(handle: RenderHandle) -> Result<Self> {
        let device = with_suppressed_stderr(|| cpal::default_host().default_output_device())
            .ok_or_else(|| StreamError::DeviceUnavailable {
                device: "default output".to_string(),
            })?;
        let default_config = device
            .default_output_config()
            .map_err(|e| StreamError::AudioPlayback {
                message: format!("Failed to query default output config: {}", e),
            })?;

        let sample_rate = default_config.sample_rate().0;
        let channels = default_config.channels();
        let stream_config = cpal::StreamConfig {
            channels,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let underruns = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&underruns);
        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if let Some(RenderOutcome::Underrun { .. }) = handle.render(data) {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }
                },
                |err| log::error!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| StreamError::AudioPlayback {
                message: format!("Failed to build output stream: {}", e),
            })?;
        stream.play().map_err(|e| StreamError::AudioPlayback {
            message: format!("Failed to start output stream: {}", e),
        })?;

        log::info!("Playing on default output device ({}ch/{}Hz)", channels, sample_rate);
        Ok(Self {
            stream,
            sample_rate,
            channels,
            underruns,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Callbacks that could not be filled completely from the buffer.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn stop(self) -> Result<()> {
        self.stream.pause().map_err(|e| StreamError::AudioPlayback {
            message: format!("Failed to stop output stream: {}", e),
        })
    }
}
