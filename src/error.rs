//! Error types for framecast.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Device errors
    #[error("Audio device not found: {device}")]
    DeviceUnavailable { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    #[error("Audio playback failed: {message}")]
    AudioPlayback { message: String },

    // Codec errors
    #[error("Audio format mismatch: expected {expected}, got {actual}")]
    FormatMismatch { expected: String, actual: String },

    #[error("Encoding failed: {message}")]
    EncodeFailure { message: String },

    #[error("Decoding failed: {message}")]
    DecodeFailure { message: String },

    // Pipeline errors
    #[error("Capture pipeline has no open stream")]
    NotCapturing,

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

impl StreamError {
    /// Shorthand for a header/payload inconsistency found while decoding.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        StreamError::FormatMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, StreamError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_config_invalid_value_display() {
        let error = StreamError::ConfigInvalidValue {
            key: "frame_duration_secs".to_string(),
            message: "must be positive".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid configuration value for frame_duration_secs: must be positive"
        );
    }

    #[test]
    fn test_device_unavailable_display() {
        let error = StreamError::DeviceUnavailable {
            device: "USB Audio".to_string(),
        };
        assert_eq!(error.to_string(), "Audio device not found: USB Audio");
    }

    #[test]
    fn test_format_mismatch_display() {
        let error = StreamError::mismatch("96000 payload bytes", "512 bytes");
        assert_eq!(
            error.to_string(),
            "Audio format mismatch: expected 96000 payload bytes, got 512 bytes"
        );
    }

    #[test]
    fn test_encode_and_decode_failure_display() {
        let encode = StreamError::EncodeFailure {
            message: "LAME rejected sample rate".to_string(),
        };
        assert_eq!(
            encode.to_string(),
            "Encoding failed: LAME rejected sample rate"
        );

        let decode = StreamError::DecodeFailure {
            message: "no audio track".to_string(),
        };
        assert_eq!(decode.to_string(), "Decoding failed: no audio track");
    }

    #[test]
    fn test_not_capturing_display() {
        assert_eq!(
            StreamError::NotCapturing.to_string(),
            "Capture pipeline has no open stream"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: StreamError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: StreamError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: StreamError = io_error.into();

        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<StreamError>();
        assert_sync::<StreamError>();
    }
}
