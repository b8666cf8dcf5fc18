use crate::capture::RemainderPolicy;
use crate::codec::{Codec, LossyQuality};
use crate::defaults;
use crate::error::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
}

/// Capture pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CaptureConfig {
    /// Exact input device name; `None` picks a preferred or default device.
    pub device: Option<String>,
    pub frame_duration_secs: f32,
    pub codec: Codec,
    pub quality: LossyQuality,
    /// Encode frames before queueing them; otherwise raw bytes are queued.
    pub auto_compress: bool,
    pub remainder: RemainderPolicy,
    /// Captures with more channels are downmixed to this many.
    pub max_channels: u16,
}

/// Playback pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Codec of incoming frames.
    pub codec: Codec,
    /// Pull a frame as soon as capture announces one.
    pub constant_stream: bool,
    /// Clock drift tolerated before the renderer skips ahead.
    pub sync_tolerance_secs: f32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            device: None,
            frame_duration_secs: defaults::FRAME_DURATION_SECS,
            codec: Codec::default(),
            quality: LossyQuality::default(),
            auto_compress: true,
            remainder: RemainderPolicy::default(),
            max_channels: defaults::MAX_TRANSPORT_CHANNELS,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            codec: Codec::default(),
            constant_stream: true,
            sync_tolerance_secs: defaults::SYNC_TOLERANCE_SECS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - FRAMECAST_DEVICE → capture.device
    /// - FRAMECAST_CODEC → capture.codec and playback.codec
    /// - FRAMECAST_FRAME_SECS → capture.frame_duration_secs
    ///
    /// Empty or unparsable values are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(device) = std::env::var("FRAMECAST_DEVICE")
            && !device.is_empty()
        {
            self.capture.device = Some(device);
        }

        if let Ok(codec) = std::env::var("FRAMECAST_CODEC")
            && !codec.is_empty()
        {
            match codec.parse::<Codec>() {
                Ok(codec) => {
                    self.capture.codec = codec;
                    self.playback.codec = codec;
                }
                Err(e) => log::warn!("Ignoring FRAMECAST_CODEC: {}", e),
            }
        }

        if let Ok(secs) = std::env::var("FRAMECAST_FRAME_SECS")
            && !secs.is_empty()
        {
            match secs.parse::<f32>() {
                Ok(secs) => self.capture.frame_duration_secs = secs,
                Err(e) => log::warn!("Ignoring FRAMECAST_FRAME_SECS='{}': {}", secs, e),
            }
        }

        self
    }

    /// Check values that would make a pipeline unusable.
    pub fn validate(&self) -> Result<()> {
        let frame = self.capture.frame_duration_secs;
        if !frame.is_finite() || frame <= 0.0 {
            return Err(StreamError::ConfigInvalidValue {
                key: "capture.frame_duration_secs".to_string(),
                message: format!("must be a positive number of seconds, got {}", frame),
            });
        }
        if self.capture.max_channels == 0 {
            return Err(StreamError::ConfigInvalidValue {
                key: "capture.max_channels".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let tolerance = self.playback.sync_tolerance_secs;
        if !tolerance.is_finite() || tolerance <= 0.0 {
            return Err(StreamError::ConfigInvalidValue {
                key: "playback.sync_tolerance_secs".to_string(),
                message: format!("must be a positive number of seconds, got {}", tolerance),
            });
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/framecast/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("framecast")
            .join("config.toml")
    }
}
