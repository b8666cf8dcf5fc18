use anyhow::{Context, Result};
use clap::Parser;
use framecast::capture::CapturePipeline;
use framecast::capture::cpal_input::{CpalAudioInput, list_devices};
use framecast::cli::{Cli, Commands};
use framecast::config::Config;
use framecast::playback::PlaybackPipeline;
use framecast::playback::cpal_output::CpalOutput;
use framecast::{Codec, defaults, record_to_file};
use std::path::Path;
use std::time::{Duration, Instant};

/// Extra time allowed past the recording length for the device to start and
/// the encoder to finish.
const RECORD_GRACE: Duration = Duration::from_secs(5);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = load_config(cli.config.as_deref())?;
    if let Some(device) = cli.device {
        config.capture.device = Some(device);
    }

    match cli.command {
        Commands::Devices => list_audio_devices(),
        Commands::Record {
            duration,
            output,
            codec,
        } => {
            if let Some(codec) = codec {
                config.capture.codec = codec;
            }
            config.validate()?;
            record(&config, duration, &output)
        }
        Commands::Monitor { duration, codec } => {
            if let Some(codec) = codec {
                set_codec(&mut config, codec);
            }
            config.validate()?;
            monitor(&config, duration)
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// Load configuration from file and apply environment overrides.
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = if let Some(path) = custom_path {
        Config::load(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default(&Config::default_path())?
    };

    Ok(config.with_env_overrides())
}

fn set_codec(config: &mut Config, codec: Codec) {
    config.capture.codec = codec;
    config.playback.codec = codec;
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}

fn record(config: &Config, duration: Duration, output: &Path) -> Result<()> {
    std::fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let input = CpalAudioInput::new(config.capture.device.as_deref());
    eprintln!("Recording {:.1}s...", duration.as_secs_f32());
    let path = record_to_file(input, &config.capture, duration, output, duration + RECORD_GRACE)?;
    println!("{}", path.display());
    Ok(())
}

/// Loop capture straight into playback for `duration`.
fn monitor(config: &Config, duration: Duration) -> Result<()> {
    let input = CpalAudioInput::new(config.capture.device.as_deref());
    let mut capture = CapturePipeline::new(input, &config.capture);
    let events = capture.subscribe();
    let mut playback = PlaybackPipeline::new(&config.playback);
    let output = CpalOutput::start(playback.render_handle())?;

    capture.play()?;
    if let Some(format) = capture.format() {
        let channels = format.channels.min(config.capture.max_channels);
        if format.sample_rate != output.sample_rate() || channels != output.channels() {
            log::warn!(
                "Capture delivers {}ch/{}Hz but output plays {}ch/{}Hz; audio will be distorted",
                channels,
                format.sample_rate,
                output.channels(),
                output.sample_rate()
            );
        }
    }

    let tick = Duration::from_millis(defaults::TICK_INTERVAL_MS);
    let deadline = Instant::now() + duration;
    while Instant::now() < deadline {
        playback.follow(&capture, &events);
        playback.update()?;
        std::thread::sleep(tick);
    }

    capture.stop()?;
    playback.follow(&capture, &events);
    while playback.pending() > 0 || playback.is_decoding() {
        playback.update()?;
        std::thread::sleep(tick);
    }

    let underruns = output.underruns();
    output.stop()?;
    log::info!("Monitor finished with {} underrun callbacks", underruns);
    Ok(())
}
