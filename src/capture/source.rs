use crate::codec::{AudioFormat, SampleFormat};
use crate::defaults;
use crate::error::{Result, StreamError};
use std::sync::{Arc, Mutex};

/// Receives raw interleaved little-endian PCM bytes from the device thread.
pub type DataCallback = Box<dyn FnMut(&[u8]) + Send + 'static>;

/// Trait for audio input devices.
///
/// This trait allows swapping implementations (real audio device vs mock).
pub trait AudioInput: Send {
    /// Select the device and report the format it will deliver.
    ///
    /// # Errors
    /// `StreamError::DeviceUnavailable` when no matching device exists.
    fn open(&mut self) -> Result<AudioFormat>;

    /// Start delivering raw bytes to `on_data`, possibly from another thread.
    fn start(&mut self, on_data: DataCallback) -> Result<()>;

    /// Stop delivering and release the stream. The callback is dropped.
    fn stop(&mut self) -> Result<()>;
}

type CallbackSlot = Arc<Mutex<Option<DataCallback>>>;

/// Mock audio input for testing.
///
/// Bytes are pushed by hand through a [`MockFeed`], standing in for the
/// device callback thread.
pub struct MockAudioInput {
    format: AudioFormat,
    slot: CallbackSlot,
    should_fail_open: bool,
    should_fail_start: bool,
    device_name: String,
}

/// Handle used by tests to deliver bytes into a started [`MockAudioInput`].
#[derive(Clone)]
pub struct MockFeed {
    slot: CallbackSlot,
}

impl MockAudioInput {
    /// Create a mock delivering 16-bit mono at the default sample rate.
    pub fn new() -> Self {
        Self {
            format: AudioFormat::new(defaults::SAMPLE_RATE, 1, SampleFormat::I16),
            slot: Arc::new(Mutex::new(None)),
            should_fail_open: false,
            should_fail_start: false,
            device_name: "mock".to_string(),
        }
    }

    /// Configure the format reported by `open`.
    pub fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    /// Configure the mock to report a missing device on `open`.
    pub fn with_missing_device(mut self, name: &str) -> Self {
        self.should_fail_open = true;
        self.device_name = name.to_string();
        self
    }

    /// Configure the mock to fail on `start`.
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Handle for delivering bytes once started.
    pub fn feed(&self) -> MockFeed {
        MockFeed {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl Default for MockAudioInput {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeed {
    /// Deliver `data` to the registered callback.
    ///
    /// Returns `false` when the input is not started.
    pub fn deliver(&self, data: &[u8]) -> bool {
        let Ok(mut slot) = self.slot.lock() else {
            return false;
        };
        match slot.as_mut() {
            Some(callback) => {
                callback(data);
                true
            }
            None => false,
        }
    }

    /// Whether a callback is currently registered.
    pub fn is_active(&self) -> bool {
        self.slot.lock().map(|s| s.is_some()).unwrap_or(false)
    }
}

impl AudioInput for MockAudioInput {
    fn open(&mut self) -> Result<AudioFormat> {
        if self.should_fail_open {
            return Err(StreamError::DeviceUnavailable {
                device: self.device_name.clone(),
            });
        }
        Ok(self.format)
    }

    fn start(&mut self, on_data: DataCallback) -> Result<()> {
        if self.should_fail_start {
            return Err(StreamError::AudioCapture {
                message: "mock audio error".to_string(),
            });
        }
        let mut slot = self.slot.lock().map_err(|e| StreamError::AudioCapture {
            message: format!("Failed to lock mock callback: {}", e),
        })?;
        *slot = Some(on_data);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut slot = self.slot.lock().map_err(|e| StreamError::AudioCapture {
            message: format!("Failed to lock mock callback: {}", e),
        })?;
        slot.take();
        Ok(())
    }
}
