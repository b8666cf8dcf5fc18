//! Record a fixed stretch of audio to a file.

use crate::capture::{AudioInput, CaptureEvent, CapturePipeline};
use crate::config::CaptureConfig;
use crate::error::{Result, StreamError};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Capture `duration` of audio from `input` and encode it into `dir`.
///
/// The capture runs as a single raw frame of `duration`; once it arrives,
/// capture stops and the frame is encoded with the configured codec to
/// `<dir>/recorded_audio.<ext>`. `timeout` bounds each wait, for the frame
/// and for the encode.
///
/// # Errors
/// Device errors from starting capture, `AudioCapture` when no frame arrives
/// in time, and the encoder's error when encoding fails.
pub fn record_to_file<I: AudioInput>(
    input: I,
    config: &CaptureConfig,
    duration: Duration,
    dir: &Path,
    timeout: Duration,
) -> Result<PathBuf> {
    let config = CaptureConfig {
        frame_duration_secs: duration.as_secs_f32(),
        auto_compress: false,
        ..config.clone()
    };
    let mut pipeline = CapturePipeline::new(input, &config);
    let events = pipeline.subscribe();

    pipeline.play()?;
    log::info!("Recording {:.1}s of audio", duration.as_secs_f32());

    let frame = wait_for(&events, timeout, |event| match event {
        CaptureEvent::FrameReady => Some(Ok(())),
        _ => None,
    })
    .and_then(|()| pipeline.get_frame().ok_or(StreamError::NotCapturing));
    pipeline.stop()?;
    let frame = frame.map_err(|e| StreamError::AudioCapture {
        message: format!("No audio captured within {:?}: {}", timeout, e),
    })?;

    pipeline.encode_frame(frame.into_bytes(), Some(dir))?;
    wait_for(&events, timeout, |event| match event {
        CaptureEvent::Recorded(path) => Some(Ok(path)),
        CaptureEvent::EncodeFailed(message) => Some(Err(StreamError::EncodeFailure { message })),
        _ => None,
    })
}

fn wait_for<T>(
    events: &Receiver<CaptureEvent>,
    timeout: Duration,
    mut accept: impl FnMut(CaptureEvent) -> Option<Result<T>>,
) -> Result<T> {
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => {
                if let Some(result) = accept(event) {
                    return result;
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                return Err(StreamError::Other(format!("timed out after {:?}", timeout)));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(StreamError::Other("capture events closed".to_string()));
            }
        }
    }
}
