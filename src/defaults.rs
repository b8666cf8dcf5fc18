//! Default configuration constants for framecast.
//!
//! Shared by the codec, the pipelines and the configuration types so the
//! numbers that define the wire formats live in one place.

/// Scale between normalised float samples and 16-bit integers.
///
/// Float samples are multiplied by this value when quantised and integer
/// samples are divided by it when expanded.
pub const I16_SCALE: f32 = 32767.0;

/// Default capture frame duration in seconds.
pub const FRAME_DURATION_SECS: f32 = 1.0;

/// Highest channel count carried through the frame queue.
///
/// Captures with more channels are downmixed by dropping the extra channels.
pub const MAX_TRANSPORT_CHANNELS: u16 = 2;

/// Playback drift (in seconds) tolerated before the renderer skips ahead.
pub const SYNC_TOLERANCE_SECS: f32 = 0.5;

/// Sample rate assumed by the renderer before the first frame is decoded.
pub const SAMPLE_RATE: u32 = 48000;

/// Channel count assumed by the renderer before the first frame is decoded.
pub const CHANNELS: u16 = 2;

/// File stem used when a frame is encoded straight to disk.
pub const RECORDING_FILE_STEM: &str = "recorded_audio";

/// Interval between playback ticks in the monitor loop, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 10;
