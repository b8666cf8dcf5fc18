//! Playback side: asynchronous decoding and clock-synchronised rendering.

#[cfg(feature = "cpal-audio")]
pub mod cpal_output;
pub mod decoder;
pub mod pipeline;
pub mod renderer;

pub use decoder::{CodecDecoder, FrameDecoder};
pub use pipeline::PlaybackPipeline;
pub use renderer::{ClockState, RenderHandle, RenderOutcome, Renderer};
