//! framecast - live audio frames, encoded, queued and played back in sync
//!
//! Capture slices a device stream into fixed-duration frames and encodes
//! them off the capture thread; playback decodes queued frames one at a time
//! and renders them against a seekable clock.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod capture;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod playback;
pub mod recorder;
pub mod station;

// Collaborator seams (device -> capture -> codec -> playback)
pub use capture::{AudioInput, FrameEncoder};
pub use playback::FrameDecoder;

// Pipelines
pub use capture::{CaptureEvent, CapturePipeline, EncodedFrame};
pub use playback::{PlaybackPipeline, RenderHandle, RenderOutcome};
pub use recorder::record_to_file;

// Codec
pub use codec::{AudioFormat, Codec, DecodedAudio, LossyQuality, SampleFormat};

// Error handling
pub use error::{Result, StreamError};

// Config
pub use config::{CaptureConfig, Config, PlaybackConfig};

// Station framework (for advanced users)
pub use station::{ErrorReporter, Station, StationError};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            let hash_part = ver.split('+').nth(1).unwrap_or("");
            assert_eq!(hash_part.len(), 7, "Git hash should be 7 chars, got: {}", ver);
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
