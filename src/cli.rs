//! Command-line interface for framecast
//!
//! Provides argument parsing using clap derive macros.

use crate::codec::Codec;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Capture, encode and play back live audio frames
#[derive(Parser, Debug)]
#[command(name = "framecast", version, about = "Live audio frames: capture, encode, play back")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Verbose output (-v: info, -vv: debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (exact name as listed by `framecast devices`)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,
}

/// Parse a duration string.
///
/// Supports any duration format accepted by `humantime`, plus bare numbers
/// as seconds (`2.5` is two and a half seconds).
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<f64>() {
        return Duration::try_from_secs_f64(secs).map_err(|e| e.to_string());
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

fn parse_codec(s: &str) -> Result<Codec, String> {
    s.parse::<Codec>().map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List available audio input devices
    Devices,

    /// Record a fixed duration to <OUTPUT>/recorded_audio.<ext>
    Record {
        /// Recording length. Examples: 5, 5s, 1m30s
        #[arg(long, short = 'd', value_name = "DURATION", default_value = "5s", value_parser = parse_duration)]
        duration: Duration,

        /// Directory to write the recording into
        #[arg(long, short = 'o', value_name = "DIR", default_value = ".")]
        output: PathBuf,

        /// Codec override (lossless, compressed_lossless, lossy)
        #[arg(long, value_name = "CODEC", value_parser = parse_codec)]
        codec: Option<Codec>,
    },

    /// Capture, encode, decode and play back on the default output device
    Monitor {
        /// How long to run. Examples: 10s, 2m
        #[arg(long, short = 'd', value_name = "DURATION", default_value = "10s", value_parser = parse_duration)]
        duration: Duration,

        /// Codec override for both directions
        #[arg(long, value_name = "CODEC", value_parser = parse_codec)]
        codec: Option<Codec>,
    },
}
