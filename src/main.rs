//! Audio transcoder
//!
//! Converts the single audio stream of an input file to AAC (or MP3 for
//! `.mp3` outputs) in the container named by the output file extension.
//!
//! Usage: `audio-transcoder <input file> <output file>`

use std::path::Path;
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_transcoder::TranscodeConfig;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
const APP_NAME: &str = "audio-transcoder";

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 3 {
        let program = args.first().map(String::as_str).unwrap_or(APP_NAME);
        eprintln!("Usage: {} <input file> <output file>", program);
        return ExitCode::FAILURE;
    }

    let config = TranscodeConfig::default();
    init_logging(&config);

    tracing::debug!("{} v{} starting", APP_NAME, VERSION);
    tracing::debug!("FFmpeg version: {}", audio_transcoder::ffmpeg_version_info());

    if let Err(e) = audio_transcoder::init() {
        tracing::error!("{}", e);
        return ExitCode::FAILURE;
    }
    audio_transcoder::install_log_filter();

    match audio_transcoder::transcode_file(Path::new(&args[1]), Path::new(&args[2]), &config) {
        Ok(stats) => {
            tracing::info!(
                samples = stats.encoded_samples,
                packets = stats.packets_written,
                "wrote {}",
                args[2]
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(kind = ?e.kind(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging with tracing
fn init_logging(config: &TranscodeConfig) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.as_str().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
