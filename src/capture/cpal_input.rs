//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::capture::source::{AudioInput, DataCallback};
use crate::codec::{AudioFormat, SampleFormat, pcm};
use crate::error::{Result, StreamError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
pub(crate) fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Devices picked ahead of the system default when no name is configured.
const PREFERRED_DEVICES: &[&str] = &["USB Audio", "pipewire", "pulse"];

/// Device name patterns that never carry a usable capture signal.
const FILTERED_PATTERNS: &[&str] = &["surround", "front:", "rear:", "HDMI", "S/PDIF"];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List capture device names, marking preferred ones with "\[recommended\]".
///
/// # Errors
/// Returns `StreamError::AudioCapture` if device enumeration fails.
pub fn list_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| StreamError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

fn find_device(device_name: Option<&str>) -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Some(name) = device_name {
            let devices = host
                .input_devices()
                .map_err(|e| StreamError::AudioCapture {
                    message: format!("Failed to enumerate devices: {}", e),
                })?;
            for dev in devices {
                if let Ok(dev_name) = dev.name()
                    && dev_name == name
                {
                    return Ok(dev);
                }
            }
            return Err(StreamError::DeviceUnavailable {
                device: name.to_string(),
            });
        }

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                    && !should_filter_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| StreamError::DeviceUnavailable {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through `&mut CpalAudioInput`, so it
/// is never accessed from two threads at once.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Captures the device's native format and forwards it as little-endian bytes.
pub struct CpalAudioInput {
    device_name: Option<String>,
    device: Option<cpal::Device>,
    config: Option<cpal::SupportedStreamConfig>,
    stream: Option<SendableStream>,
}

impl CpalAudioInput {
    /// # Arguments
    /// * `device_name` - exact device name; `None` picks a preferred or default device.
    pub fn new(device_name: Option<&str>) -> Self {
        Self {
            device_name: device_name.map(str::to_string),
            device: None,
            config: None,
            stream: None,
        }
    }

    fn build_stream(
        device: &cpal::Device,
        config: &cpal::SupportedStreamConfig,
        mut on_data: DataCallback,
    ) -> Result<cpal::Stream> {
        let stream_config: cpal::StreamConfig = config.clone().into();
        let err_callback = |err| {
            log::error!("Audio input stream error: {}", err);
        };

        let stream = match config.sample_format() {
            cpal::SampleFormat::I16 => device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| on_data(&pcm::i16_to_le_bytes(data)),
                err_callback,
                None,
            ),
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| on_data(&pcm::f32_to_le_bytes(data)),
                err_callback,
                None,
            ),
            other => {
                return Err(StreamError::AudioCapture {
                    message: format!("Unsupported native sample format: {:?}", other),
                });
            }
        };
        stream.map_err(|e| StreamError::AudioCapture {
            message: format!("Failed to build input stream: {}", e),
        })
    }
}

impl AudioInput for CpalAudioInput {
    fn open(&mut self) -> Result<AudioFormat> {
        let device = find_device(self.device_name.as_deref())?;
        let config = device
            .default_input_config()
            .map_err(|e| StreamError::AudioCapture {
                message: format!("Failed to query default input config: {}", e),
            })?;

        let sample_format = match config.sample_format() {
            cpal::SampleFormat::I16 => SampleFormat::I16,
            cpal::SampleFormat::F32 => SampleFormat::F32,
            other => {
                return Err(StreamError::AudioCapture {
                    message: format!(
                        "Unsupported native sample format: {:?}. Try another device.",
                        other
                    ),
                });
            }
        };
        let format = AudioFormat::new(config.sample_rate().0, config.channels(), sample_format);

        if let Ok(name) = device.name() {
            log::info!("Opened input device '{}' ({})", name, format);
        }
        self.device = Some(device);
        self.config = Some(config);
        Ok(format)
    }

    fn start(&mut self, on_data: DataCallback) -> Result<()> {
        let (Some(device), Some(config)) = (&self.device, &self.config) else {
            return Err(StreamError::NotCapturing);
        };

        let stream = Self::build_stream(device, config, on_data)?;
        stream.play().map_err(|e| StreamError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;
        self.stream = Some(SendableStream(stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(sendable_stream) = self.stream.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| StreamError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        Ok(())
    }
}
