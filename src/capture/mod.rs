//! Capture side: input devices, frame slicing and asynchronous encoding.

pub mod accumulator;
#[cfg(feature = "cpal-audio")]
pub mod cpal_input;
pub mod encoder;
pub mod events;
pub mod pipeline;
pub mod source;

pub use accumulator::{FrameAccumulator, RemainderPolicy};
pub use encoder::{CodecEncoder, EncodedFrame, FrameEncoder};
pub use events::{CaptureEvent, EventBus};
pub use pipeline::{CapturePipeline, CaptureState};
pub use source::{AudioInput, DataCallback, MockAudioInput, MockFeed};
