//! Sample buffer and clock synchronisation for the output render callback.
//!
//! The renderer reconciles two positions, both counted in interleaved
//! samples: `desired`, moved by explicit seeks, and `rendered`, advanced
//! by every sample emitted or skipped. Until the first seek there is no
//! external clock to follow and the buffer simply plays in order. Once
//! following, each block is handled as:
//!
//! 1. An explicit seek whose target is behind `rendered` yields silence and
//!    leaves both positions untouched.
//! 2. A gap smaller than the sync tolerance is ignored and the buffer is
//!    played sequentially.
//! 3. A larger gap in either direction drops `|gap|` buffered samples. A
//!    forward gap advances `rendered` past the dropped samples; a backward
//!    one snaps `rendered` back onto `desired`.
//!
//! Whatever cannot be filled from the buffer is written as silence.

use crate::defaults;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

/// Playback clock, in interleaved samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClockState {
    pub desired: i64,
    pub rendered: i64,
    pub explicit_seek: bool,
}

/// What a single render call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Waiting for an explicit seek target; the block is silent.
    AwaitingSeek,
    /// The block was filled from the buffer.
    Filled { skipped: usize },
    /// The buffer ran dry; `missing` trailing samples are silence.
    Underrun {
        skipped: usize,
        copied: usize,
        missing: usize,
    },
}

#[derive(Debug)]
pub struct Renderer {
    buffer: VecDeque<f32>,
    clock: ClockState,
    sample_rate: u32,
    channels: u16,
    tolerance_secs: f32,
    /// Set by the first seek; `desired` is meaningless before that.
    following: bool,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(defaults::SYNC_TOLERANCE_SECS)
    }
}

impl Renderer {
    pub fn new(tolerance_secs: f32) -> Self {
        Self {
            buffer: VecDeque::new(),
            clock: ClockState::default(),
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
            tolerance_secs,
            following: false,
        }
    }

    /// Append decoded samples and adopt their format.
    pub fn append(&mut self, samples: &[f32], sample_rate: u32, channels: u16) {
        if sample_rate != self.sample_rate || channels != self.channels {
            log::debug!(
                "Playback format now {}ch/{}Hz (was {}ch/{}Hz)",
                channels,
                sample_rate,
                self.channels,
                self.sample_rate
            );
            self.sample_rate = sample_rate;
            self.channels = channels;
        }
        self.buffer.extend(samples);
    }

    /// Request playback from `seconds` into the stream.
    ///
    /// From then on `desired` is treated as the caller's clock: if rendering
    /// runs more than the tolerance ahead of it, buffered audio is dropped
    /// to get back in step.
    pub fn set_play_position(&mut self, seconds: f64) {
        self.clock.desired = (seconds * self.samples_per_second() as f64) as i64;
        self.clock.explicit_seek = true;
        self.following = true;
    }

    /// Drop buffered audio and rewind the clock.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.clock = ClockState::default();
        self.following = false;
    }

    pub fn clock(&self) -> ClockState {
        self.clock
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    fn samples_per_second(&self) -> i64 {
        self.sample_rate as i64 * self.channels as i64
    }

    /// Fill `out` with the next block of interleaved samples.
    pub fn render(&mut self, out: &mut [f32]) -> RenderOutcome {
        let diff = self.clock.desired - self.clock.rendered;

        if self.clock.explicit_seek && diff < 0 {
            out.fill(0.0);
            return RenderOutcome::AwaitingSeek;
        }

        let per_second = self.samples_per_second().max(1) as f64;
        let out_of_sync =
            self.following && (diff.unsigned_abs() as f64 / per_second) >= self.tolerance_secs as f64;

        let mut skipped = 0;
        if out_of_sync {
            let distance = usize::try_from(diff.unsigned_abs()).unwrap_or(usize::MAX);
            skipped = distance.min(self.buffer.len());
            self.buffer.drain(..skipped);
        }

        let copied = self.buffer.len().min(out.len());
        for (slot, sample) in out.iter_mut().zip(self.buffer.drain(..copied)) {
            *slot = sample;
        }
        out[copied..].fill(0.0);

        if out_of_sync && diff < 0 {
            self.clock.rendered = self.clock.desired + copied as i64;
        } else {
            self.clock.rendered += (skipped + copied) as i64;
        }
        if self.clock.explicit_seek && self.clock.rendered >= self.clock.desired {
            self.clock.explicit_seek = false;
        }

        if copied < out.len() {
            RenderOutcome::Underrun {
                skipped,
                copied,
                missing: out.len() - copied,
            }
        } else {
            RenderOutcome::Filled { skipped }
        }
    }
}

/// Shareable handle for the device render callback.
///
/// `render` never waits: if the pipeline holds the renderer, the block is
/// silence.
#[derive(Debug, Clone, Default)]
pub struct RenderHandle {
    inner: Arc<Mutex<Renderer>>,
}

impl RenderHandle {
    pub fn new(renderer: Renderer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(renderer)),
        }
    }

    /// Render into `out`; `None` when the renderer was busy.
    pub fn render(&self, out: &mut [f32]) -> Option<RenderOutcome> {
        match self.inner.try_lock() {
            Ok(mut renderer) => Some(renderer.render(out)),
            Err(_) => {
                out.fill(0.0);
                None
            }
        }
    }

    /// Run `f` with the renderer locked, waiting if necessary.
    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Renderer) -> R) -> R {
        let mut renderer = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut renderer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48000;
    const PER_SECOND: usize = 96000;

    fn renderer() -> Renderer {
        Renderer::new(0.5)
    }

    fn ramp(len: usize) -> Vec<f32> {
        (0..len).map(|i| (i % 1000) as f32 / 1000.0 + 0.001).collect()
    }

    #[test]
    fn test_sequential_render_consumes_from_head() {
        let mut r = renderer();
        let samples = ramp(10);
        r.append(&samples, RATE, 2);

        let mut out = [9.0f32; 4];
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(&out, &samples[..4]);
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(&out, &samples[4..8]);
        assert_eq!(r.clock().rendered, 8);
        assert_eq!(r.buffered(), 2);
    }

    #[test]
    fn test_underrun_is_silence_filled() {
        let mut r = renderer();
        r.append(&[0.5, 0.5, 0.5], RATE, 2);

        let mut out = [9.0f32; 8];
        assert_eq!(
            r.render(&mut out),
            RenderOutcome::Underrun {
                skipped: 0,
                copied: 3,
                missing: 5
            }
        );
        assert_eq!(out, [0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert_eq!(r.clock().rendered, 3);

        assert!(matches!(r.render(&mut out), RenderOutcome::Underrun { copied: 0, .. }));
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gap_beyond_tolerance_skips_ahead() {
        let mut r = renderer();
        r.append(&ramp(200_000), RATE, 2);
        r.following = true;
        r.clock.desired = 100_000;

        let mut out = [0.0f32; 480];
        let outcome = r.render(&mut out);

        assert_eq!(outcome, RenderOutcome::Filled { skipped: 100_000 });
        // The block starts where sample 100_000 of the buffer was.
        assert_eq!(out[0], ramp(200_000)[100_000]);
        assert_eq!(r.clock().rendered, 100_480);
        assert_eq!(r.buffered(), 200_000 - 100_480);
    }

    #[test]
    fn test_gap_within_tolerance_plays_sequentially() {
        let mut r = renderer();
        let samples = ramp(100_000);
        r.append(&samples, RATE, 2);
        // 0.4s ahead at 96000 samples per second.
        r.following = true;
        r.clock.desired = 38_400;

        let mut out = [0.0f32; 16];
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(&out, &samples[..16]);
    }

    #[test]
    fn test_clock_behind_rendered_skips_ahead_and_resyncs() {
        let mut r = renderer();
        let samples: Vec<f32> = (0..300_000).map(|i| i as f32).collect();
        r.append(&samples, RATE, 2);
        r.set_play_position(0.0);

        // The clock stalls at 0 while 100_000 samples play.
        let mut first = vec![0.0f32; 100_000];
        assert_eq!(r.render(&mut first), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(
            r.clock(),
            ClockState {
                desired: 0,
                rendered: 100_000,
                explicit_seek: false
            }
        );

        // Over a second apart: the head is dropped rather than replayed.
        let mut out = [0.0f32; 4];
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 100_000 });
        assert_eq!(out, [200_000.0, 200_001.0, 200_002.0, 200_003.0]);
        assert_eq!(r.clock().rendered, 4);

        // Back in sync, the next block continues sequentially.
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(out, [200_004.0, 200_005.0, 200_006.0, 200_007.0]);
        assert_eq!(r.clock().rendered, 8);
    }

    #[test]
    fn test_unfollowed_clock_plays_sequentially() {
        let mut r = renderer();
        let samples = ramp(1000);
        r.append(&samples, RATE, 2);
        r.clock.rendered = 100_000;

        let mut out = [0.0f32; 8];
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(&out, &samples[..8]);
        assert_eq!(r.clock().rendered, 100_008);
    }

    #[test]
    fn test_small_backward_gap_plays_sequentially() {
        let mut r = renderer();
        let samples = ramp(1000);
        r.append(&samples, RATE, 2);
        r.following = true;
        r.clock.rendered = 40_000;

        let mut out = [0.0f32; 8];
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert_eq!(&out, &samples[..8]);
        assert_eq!(r.clock().rendered, 40_008);
    }

    #[test]
    fn test_explicit_seek_behind_renders_silence_without_moving() {
        let mut r = renderer();
        r.append(&ramp(1000), RATE, 2);
        r.clock.rendered = 500;
        r.set_play_position(0.0);

        let mut out = [7.0f32; 8];
        assert_eq!(r.render(&mut out), RenderOutcome::AwaitingSeek);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(r.clock().rendered, 500);
        assert_eq!(r.buffered(), 1000);
    }

    #[test]
    fn test_set_play_position_two_seconds() {
        let mut r = renderer();
        r.append(&[], RATE, 2);
        r.set_play_position(2.0);

        assert_eq!(
            r.clock(),
            ClockState {
                desired: 192_000,
                rendered: 0,
                explicit_seek: true
            }
        );
    }

    #[test]
    fn test_seek_emits_silence_until_target_reached() {
        let mut r = renderer();
        r.set_play_position(2.0);
        let mut out = vec![1.0f32; 9600];

        // First second of audio arrives and is skipped; the block is silent.
        r.append(&vec![0.25; PER_SECOND], RATE, 2);
        assert_eq!(
            r.render(&mut out),
            RenderOutcome::Underrun {
                skipped: PER_SECOND,
                copied: 0,
                missing: 9600
            }
        );
        assert!(out.iter().all(|&s| s == 0.0));
        assert!(r.clock().explicit_seek);

        // Second second, likewise.
        r.append(&vec![0.25; PER_SECOND], RATE, 2);
        r.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(r.clock().rendered, 192_000);
        assert!(!r.clock().explicit_seek);

        // Audio from the target onwards plays.
        r.append(&vec![0.75; PER_SECOND], RATE, 2);
        assert_eq!(r.render(&mut out), RenderOutcome::Filled { skipped: 0 });
        assert!(out.iter().all(|&s| s == 0.75));
        assert_eq!(r.clock().rendered, 192_000 + 9600);
    }

    #[test]
    fn test_latest_format_wins() {
        let mut r = renderer();
        r.append(&[0.0; 4], 48000, 2);
        r.append(&[0.0; 4], 22050, 1);
        assert_eq!(r.sample_rate(), 22050);
        assert_eq!(r.channels(), 1);

        r.set_play_position(1.0);
        assert_eq!(r.clock().desired, 22050);
    }

    #[test]
    fn test_reset_clears_buffer_and_clock() {
        let mut r = renderer();
        r.append(&[0.1; 10], RATE, 2);
        r.set_play_position(1.0);
        r.reset();

        assert_eq!(r.buffered(), 0);
        assert_eq!(r.clock(), ClockState::default());
    }

    #[test]
    fn test_handle_renders_silence_when_busy() {
        let handle = RenderHandle::new(renderer());
        handle.with(|r| r.append(&[0.5; 4], RATE, 2));

        let guard = handle.inner.lock().unwrap();
        let mut out = [1.0f32; 4];
        assert_eq!(handle.render(&mut out), None);
        assert_eq!(out, [0.0; 4]);
        drop(guard);

        assert_eq!(handle.render(&mut out), Some(RenderOutcome::Filled { skipped: 0 }));
        assert_eq!(out, [0.5; 4]);
    }
}
